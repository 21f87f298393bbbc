//! Trip graph: dives grouped into multi-dive excursions.
//!
//! [`DiveLog`] is the session context that owns the dive table and the trip
//! registry and keeps the dive ↔ trip back references consistent. Every
//! mutating operation lives in [`ops`] or [`autogroup`] and leaves the
//! following true:
//!
//! - a trip's member list and each member's `trip` field agree;
//! - a trip's `when` is the earliest start among its members;
//! - the registry is sorted by `when`;
//! - no registered trip is empty.

pub mod autogroup;
pub mod ops;
pub mod registry;

pub use registry::TripRegistry;

use crate::config::DiveLogConfig;
use crate::metrics::DiveMetrics;
use crate::models::{Dive, DiveId, Trip, TripId};
use crate::storage::DiveStore;

#[derive(Clone, Debug, Default)]
pub struct DiveLog {
    pub(crate) store: DiveStore,
    pub(crate) trips: TripRegistry,
    config: DiveLogConfig,
    changed: bool,
}

impl DiveLog {
    pub fn new(config: DiveLogConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &DiveStore {
        &self.store
    }

    pub fn trips(&self) -> &TripRegistry {
        &self.trips
    }

    pub fn config(&self) -> &DiveLogConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DiveLogConfig) {
        self.config = config;
    }

    pub fn dive(&self, id: DiveId) -> Option<&Dive> {
        self.store.dive(id)
    }

    pub fn trip(&self, id: TripId) -> Option<&Trip> {
        self.trips.get(id)
    }

    /// The trip a dive belongs to, if any.
    pub fn trip_of(&self, dive: DiveId) -> Option<&Trip> {
        self.store
            .dive(dive)
            .and_then(|d| d.trip)
            .and_then(|t| self.trips.get(t))
    }

    /// Select or deselect a dive. Selection is not a structural change.
    pub fn set_selected(&mut self, dive: DiveId, selected: bool) {
        if let Some(d) = self.store.dive_mut(dive) {
            d.selected = selected;
        }
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.changed
    }

    pub fn mark_saved(&mut self) {
        self.changed = false;
    }

    /// Number trips in display order (newest dive first) as `-1, -2, …`.
    pub fn assign_trip_indexes(&mut self) {
        for trip in self.trips.iter_mut() {
            trip.display_index = None;
        }
        let mut next = 0;
        for dive in self.store.iter().rev() {
            let Some(trip) = dive.trip.and_then(|t| self.trips.get_mut(t)) else {
                continue;
            };
            if trip.display_index.is_none() {
                next += 1;
                trip.display_index = Some(-next);
            }
        }
    }

    /// Recompute and cache SAC and OTU on a dive record.
    pub fn update_cylinder_related_info(&mut self, dive: DiveId) {
        if let Some(d) = self.store.dive_mut(dive) {
            let metrics = DiveMetrics::compute(d);
            d.sac_ml_per_min = metrics.sac_ml_per_min;
            d.otu = metrics.otu;
        }
    }

    /// Regroup if configured, renumber trips and refresh cached metrics.
    pub fn refresh(&mut self) {
        if self.config.autogroup {
            self.autogroup();
        }
        self.assign_trip_indexes();
        for id in self.store.ids() {
            self.update_cylinder_related_info(id);
        }
    }

    /// Describe every broken dive/trip invariant; empty when consistent.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut last_when = i64::MIN;
        for trip in self.trips.iter() {
            if trip.when < last_when {
                problems.push(format!("trip {:?} out of order", trip.id));
            }
            last_when = trip.when;

            if trip.dives.is_empty() {
                problems.push(format!("trip {:?} is empty", trip.id));
                continue;
            }
            let counted = self
                .store
                .iter()
                .filter(|d| d.trip == Some(trip.id))
                .count();
            if counted != trip.member_count() {
                problems.push(format!(
                    "trip {:?} lists {} members but {} dives point at it",
                    trip.id,
                    trip.member_count(),
                    counted
                ));
            }
            let earliest = trip
                .dives
                .iter()
                .filter_map(|id| self.store.dive(*id))
                .map(|d| d.start_time_unix)
                .min();
            if earliest != Some(trip.when) {
                problems.push(format!(
                    "trip {:?} starts at {} but its earliest dive is {:?}",
                    trip.id, trip.when, earliest
                ));
            }
        }

        for dive in self.store.iter() {
            if let Some(trip) = dive.trip {
                match self.trips.get(trip) {
                    Some(t) if t.contains(dive.id) => {}
                    Some(_) => problems.push(format!(
                        "dive {:?} points at trip {:?} which does not list it",
                        dive.id, trip
                    )),
                    None => problems.push(format!(
                        "dive {:?} points at missing trip {:?}",
                        dive.id, trip
                    )),
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_trip_indexes_newest_first() {
        let mut log = DiveLog::default();
        let a = log.add_dive(Dive::new(1_000, 600));
        let b = log.add_dive(Dive::new(500_000, 600));
        let loose = log.add_dive(Dive::new(900_000, 600));
        let old_trip = log.create_trip_from_dive(a);
        let new_trip = log.create_trip_from_dive(b);

        log.assign_trip_indexes();

        assert_eq!(log.trips().find_by_trip_id(-1), Some(new_trip));
        assert_eq!(log.trips().find_by_trip_id(-2), Some(old_trip));
        assert!(log.trip_of(loose).is_none());
    }

    #[test]
    fn test_changed_flag() {
        let mut log = DiveLog::default();
        assert!(!log.has_unsaved_changes());
        let dive = log.add_dive(Dive::new(1_000, 600));
        assert!(log.has_unsaved_changes());
        log.mark_saved();
        log.set_selected(dive, true);
        assert!(!log.has_unsaved_changes(), "selection is not a structural change");
    }

    #[test]
    fn test_refresh_autogroups_when_enabled() {
        let mut log = DiveLog::new(DiveLogConfig {
            autogroup: true,
            ..DiveLogConfig::default()
        });
        log.add_dive(Dive::new(1_000, 600));
        log.add_dive(Dive::new(5_000, 600));

        log.refresh();

        assert_eq!(log.trips().len(), 1);
        assert!(log.trips().find_by_trip_id(-1).is_some());
        assert!(log.check_consistency().is_empty());
    }

    #[test]
    fn test_refresh_without_autogroup_keeps_dives_loose() {
        let mut log = DiveLog::default();
        log.add_dive(Dive::new(1_000, 600));
        log.refresh();
        assert!(log.trips().is_empty());
    }
}
