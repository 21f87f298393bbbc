//! Automatic trip grouping.

use tracing::info;

use crate::models::{Dive, DiveId, TripFlag, TripOrigin};
use crate::trip::DiveLog;

/// A dive takes part in auto-grouping only if it is loose, was never
/// deliberately detached and actually has a duration.
fn needs_grouping(dive: &Dive) -> bool {
    dive.trip.is_none() && dive.trip_flag == TripFlag::Unassigned && dive.duration_sec > 0
}

impl DiveLog {
    /// Group loose dives into trips by start-time proximity.
    ///
    /// Walks the table in chronological order. A dive that already has a trip
    /// becomes the anchor for the dives after it; an eligible dive joins the
    /// anchor's trip when it starts within the configured threshold of the
    /// anchor, and otherwise opens a new auto-generated trip. Returns the
    /// number of dives that were grouped.
    pub fn autogroup(&mut self) -> usize {
        let threshold = self.config().trip_threshold_sec;
        let mut last: Option<DiveId> = None;
        let mut grouped = 0;

        for id in self.store.ids() {
            let Some(dive) = self.store.dive(id) else {
                continue;
            };
            if dive.trip.is_some() {
                last = Some(id);
                continue;
            }
            if !needs_grouping(dive) {
                last = None;
                continue;
            }
            let when = dive.start_time_unix;
            let location = dive.location.clone();

            let anchor = last
                .and_then(|l| self.store.dive(l))
                .filter(|l| when < l.start_time_unix.saturating_add(threshold))
                .map(|l| (l.id, l.trip));
            match anchor {
                Some((_, Some(trip))) => self.add_dive_to_trip(id, trip),
                Some((anchor, None)) => {
                    let trip = self.create_trip_with_origin(anchor, TripOrigin::Autogen);
                    self.add_dive_to_trip(id, trip);
                }
                None => {
                    self.create_trip_with_origin(id, TripOrigin::Autogen);
                }
            }

            if let Some(trip) = self.store.dive(id).and_then(|d| d.trip) {
                if let Some(t) = self.trips.get_mut(trip) {
                    if t.location.is_none() {
                        t.location = location;
                    }
                }
            }
            grouped += 1;
            last = Some(id);
        }

        info!(grouped, trips = self.trips.len(), "autogrouped dives");
        grouped
    }

    /// Dissolve every auto-generated trip. Its dives become loose and
    /// eligible for the next auto-grouping pass.
    pub fn remove_autogen_trips(&mut self) {
        let autogen: Vec<_> = self
            .trips
            .iter()
            .filter(|t| t.is_autogen())
            .map(|t| t.id)
            .collect();
        let count = autogen.len();

        for trip in autogen {
            let members = self
                .trips
                .get(trip)
                .map(|t| t.dives.clone())
                .unwrap_or_default();
            for dive in members {
                self.remove_dive_from_trip(dive);
                if let Some(d) = self.store.dive_mut(dive) {
                    d.trip_flag = TripFlag::Unassigned;
                }
            }
        }
        info!(removed = count, "removed auto-generated trips");
    }
}
