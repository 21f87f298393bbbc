//! Trip membership mutations.
//!
//! Everything here funnels through [`DiveLog::add_dive_to_trip`] and
//! [`DiveLog::remove_dive_from_trip`], which own the bookkeeping: member
//! lists, back references, trip start times and the cascade delete of a
//! trip whose last member leaves.
//!
//! Passing ids that are not in the log, merging a trip into itself or
//! splitting at a dive that is not a later member of a trip are contract
//! violations and panic.

use tracing::debug;

use crate::models::{Dive, DiveId, Trip, TripFlag, TripId, TripOrigin};
use crate::trip::registry::Placement;
use crate::trip::DiveLog;

impl DiveLog {
    fn dive_start(&self, dive: DiveId) -> i64 {
        self.store
            .dive(dive)
            .unwrap_or_else(|| panic!("unknown dive {dive:?}"))
            .start_time_unix
    }

    /// Set a trip's start to the earliest start among its members.
    fn refresh_trip_start(&mut self, trip: TripId) {
        let Some(t) = self.trips.get_mut(trip) else {
            return;
        };
        let earliest = t
            .dives
            .iter()
            .filter_map(|id| self.store.dive(*id))
            .map(|d| d.start_time_unix)
            .min();
        if let Some(when) = earliest {
            if when != t.when {
                t.when = when;
                self.trips.resort();
            }
        }
    }

    /// Add a dive to the table at its chronological position.
    ///
    /// The dive enters the log without a trip; use the trip operations to
    /// group it.
    pub fn add_dive(&mut self, mut dive: Dive) -> DiveId {
        dive.trip = None;
        if dive.trip_flag == TripFlag::Assigned {
            dive.trip_flag = TripFlag::Unassigned;
        }
        let id = self.store.insert(dive);
        self.mark_changed();
        id
    }

    /// Remove a dive from the log, detaching it from its trip first.
    pub fn delete_dive(&mut self, dive: DiveId) -> Option<Dive> {
        self.store.dive(dive)?;
        self.remove_dive_from_trip(dive);
        let removed = self.store.remove(dive);
        self.mark_changed();
        debug!(dive = ?dive, "deleted dive");
        removed
    }

    /// Link a trip into the registry, merging it into an existing trip that
    /// starts at the same time. Returns the canonical trip.
    fn link_trip(&mut self, trip: Trip) -> TripId {
        match self.trips.place(trip) {
            Placement::Linked(id) => id,
            Placement::Duplicate { existing, incoming } => {
                if let Some(t) = self.trips.get_mut(existing) {
                    if t.location.as_deref().map_or(true, str::is_empty) {
                        t.location = incoming.location.filter(|s| !s.is_empty());
                    }
                    if t.notes.as_deref().map_or(true, str::is_empty) {
                        t.notes = incoming.notes.filter(|s| !s.is_empty());
                    }
                }
                debug!(trip = ?existing, "merged duplicate trip start");
                existing
            }
        }
    }

    /// Register a trip together with the dives it lists.
    ///
    /// If a trip with the same start already exists, the listed dives move
    /// into it and missing location/notes are filled from `trip`. Returns the
    /// canonical trip, or `None` when no dive ended up in it.
    pub fn insert_trip(&mut self, mut trip: Trip) -> Option<TripId> {
        let members = std::mem::take(&mut trip.dives);
        if let Some(earliest) = members
            .iter()
            .filter_map(|id| self.store.dive(*id))
            .map(|d| d.start_time_unix)
            .min()
        {
            trip.when = earliest;
        }

        let id = self.link_trip(trip);
        for dive in members {
            self.add_dive_to_trip(dive, id);
        }

        if self.trips.get(id).is_some_and(|t| t.dives.is_empty()) {
            self.trips.delete(id);
            return None;
        }
        self.mark_changed();
        Some(id)
    }

    /// Make `dive` a member of `trip`, leaving any previous trip.
    pub fn add_dive_to_trip(&mut self, dive: DiveId, trip: TripId) {
        let when = self.dive_start(dive);
        if self.store.dive(dive).and_then(|d| d.trip) == Some(trip) {
            return;
        }
        assert!(self.trips.get(trip).is_some(), "unknown trip {trip:?}");

        self.remove_dive_from_trip(dive);

        if let Some(d) = self.store.dive_mut(dive) {
            d.trip = Some(trip);
            d.trip_flag = TripFlag::Assigned;
        }
        let mut moved_start = false;
        if let Some(t) = self.trips.get_mut(trip) {
            t.dives.push(dive);
            if when < t.when {
                t.when = when;
                moved_start = true;
            }
        }
        if moved_start {
            self.trips.resort();
        }
        self.mark_changed();
        debug!(dive = ?dive, trip = ?trip, "added dive to trip");
    }

    /// Take `dive` out of its trip. An emptied trip is deleted.
    pub fn remove_dive_from_trip(&mut self, dive: DiveId) {
        let Some(d) = self.store.dive_mut(dive) else {
            panic!("unknown dive {dive:?}");
        };
        let Some(trip) = d.trip.take() else {
            return;
        };
        d.trip_flag = TripFlag::Detached;
        let when = d.start_time_unix;

        let t = self
            .trips
            .get_mut(trip)
            .unwrap_or_else(|| panic!("dive {dive:?} refers to unknown trip {trip:?}"));
        if let Some(pos) = t.dives.iter().position(|m| *m == dive) {
            t.dives.remove(pos);
        }
        let emptied = t.dives.is_empty();
        let defined_start = t.when == when;

        if emptied {
            self.trips.delete(trip);
            debug!(trip = ?trip, "deleted empty trip");
        } else if defined_start {
            self.refresh_trip_start(trip);
        }
        self.mark_changed();
        debug!(dive = ?dive, trip = ?trip, "removed dive from trip");
    }

    /// Detach every member of a trip, which deletes it.
    pub fn remove_trip(&mut self, trip: TripId) {
        let members = self
            .trips
            .get(trip)
            .map(|t| t.dives.clone())
            .unwrap_or_default();
        for dive in members {
            self.remove_dive_from_trip(dive);
        }
    }

    /// Start a new trip from a single dive, seeded with its time and location.
    pub fn create_trip_from_dive(&mut self, dive: DiveId) -> TripId {
        self.create_trip_with_origin(dive, TripOrigin::Manual)
    }

    pub(crate) fn create_trip_with_origin(&mut self, dive: DiveId, origin: TripOrigin) -> TripId {
        let d = self
            .store
            .dive(dive)
            .unwrap_or_else(|| panic!("unknown dive {dive:?}"));
        let trip = Trip {
            when: d.start_time_unix,
            location: d.location.clone(),
            origin,
            ..Trip::default()
        };
        let id = self.link_trip(trip);
        self.add_dive_to_trip(dive, id);
        debug!(trip = ?id, dive = ?dive, ?origin, "created trip");
        id
    }

    /// Turn a loose dive into a single-dive trip.
    pub fn promote_dive_to_trip(&mut self, dive: DiveId) -> TripId {
        self.create_trip_from_dive(dive)
    }

    /// Undo [`DiveLog::promote_dive_to_trip`]: the dive leaves its trip.
    pub fn demote_dive(&mut self, dive: DiveId) {
        self.remove_dive_from_trip(dive);
    }

    /// Move every dive of `source` into `destination`; `source` disappears.
    pub fn merge_trips(&mut self, source: TripId, destination: TripId) {
        assert_ne!(source, destination, "cannot merge a trip into itself");
        assert!(
            self.trips.get(destination).is_some(),
            "unknown trip {destination:?}"
        );
        while let Some(dive) = self
            .trips
            .get(source)
            .and_then(|t| t.dives.first().copied())
        {
            self.add_dive_to_trip(dive, destination);
        }
        debug!(source = ?source, destination = ?destination, "merged trips");
    }

    /// Split a trip before `boundary`: it and every later member move to a
    /// new trip. Returns the trip now holding `boundary`.
    pub fn split_trip(&mut self, boundary: DiveId) -> TripId {
        let boundary_when = self.dive_start(boundary);
        let trip = self
            .store
            .dive(boundary)
            .and_then(|d| d.trip)
            .unwrap_or_else(|| panic!("split boundary {boundary:?} is not in a trip"));
        let t = self
            .trips
            .get(trip)
            .unwrap_or_else(|| panic!("dive {boundary:?} refers to unknown trip {trip:?}"));
        assert!(
            boundary_when > t.when,
            "split boundary {boundary:?} is the first dive of trip {trip:?}"
        );

        let mut moving: Vec<(usize, DiveId)> = t
            .dives
            .iter()
            .filter(|id| **id != boundary)
            .filter_map(|id| self.store.index_of(*id).map(|idx| (idx, *id)))
            .filter(|(idx, _)| {
                self.store
                    .get(*idx)
                    .is_some_and(|d| d.start_time_unix >= boundary_when)
            })
            .collect();
        moving.sort_unstable();

        let new_trip = self.create_trip_from_dive(boundary);
        for (_, dive) in moving {
            self.add_dive_to_trip(dive, new_trip);
        }
        debug!(from = ?trip, to = ?new_trip, "split trip");
        new_trip
    }

    /// Attach a loose dive to the trip of the dive right before it.
    ///
    /// With `include_selected_run`, the following loose dives keep joining
    /// as long as each one and its predecessor are selected.
    pub fn merge_dive_into_previous_trip(
        &mut self,
        dive: DiveId,
        include_selected_run: bool,
    ) -> Option<TripId> {
        let index = self.store.index_of(dive)?;
        let trip = index
            .checked_sub(1)
            .and_then(|prev| self.store.get(prev))
            .and_then(|prev| prev.trip)?;

        self.add_dive_to_trip(dive, trip);

        if include_selected_run {
            let mut prev = dive;
            loop {
                let Some(next) = self
                    .store
                    .index_of(prev)
                    .and_then(|i| self.store.get(i + 1))
                else {
                    break;
                };
                let prev_selected = self.store.dive(prev).is_some_and(|d| d.selected);
                if next.trip.is_some() || !next.selected || !prev_selected {
                    break;
                }
                let next = next.id;
                self.add_dive_to_trip(next, trip);
                prev = next;
            }
        }
        Some(trip)
    }

    /// Change a dive's start time, leaving its trip if it no longer fits.
    pub fn set_dive_time(&mut self, dive: DiveId, when: i64) {
        let old = self.dive_start(dive);
        if old == when {
            return;
        }

        let trip = self.store.dive(dive).and_then(|d| d.trip);
        let mut stays = false;
        if let Some(trip) = trip {
            let (members, trip_when) = self
                .trips
                .get(trip)
                .map(|t| (t.member_count(), t.when))
                .unwrap_or_else(|| panic!("dive {dive:?} refers to unknown trip {trip:?}"));
            if members == 1 {
                stays = true;
            } else if trip_when > when
                || self.trips.find_trip_at_or_before(when) != Some(trip)
            {
                self.remove_dive_from_trip(dive);
            } else {
                stays = true;
            }
        }

        if let Some(d) = self.store.dive_mut(dive) {
            d.start_time_unix = when;
        }
        self.store.resort();
        if let (true, Some(trip)) = (stays, trip) {
            self.refresh_trip_start(trip);
        }
        self.mark_changed();
    }
}
