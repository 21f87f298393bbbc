use crate::models::{Trip, TripId};

/// Outcome of linking a trip into the registry.
#[derive(Debug)]
pub(crate) enum Placement {
    /// The trip was linked at its sorted position.
    Linked(TripId),
    /// A trip with the same start already exists; the incoming one was not linked.
    Duplicate { existing: TripId, incoming: Trip },
}

/// Trips sorted ascending by start time.
#[derive(Clone, Debug, Default)]
pub struct TripRegistry {
    trips: Vec<Trip>,
    next_id: u64,
}

impl TripRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Trip> {
        self.trips.iter()
    }

    pub fn get(&self, id: TripId) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: TripId) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|t| t.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Trip> {
        self.trips.iter_mut()
    }

    /// Look up a trip by the negative display id of the last indexing pass.
    pub fn find_by_trip_id(&self, display_index: i32) -> Option<TripId> {
        if display_index >= 0 {
            return None;
        }
        self.trips
            .iter()
            .find(|t| t.display_index == Some(display_index))
            .map(|t| t.id)
    }

    /// The trip with the latest start at or before `timestamp`.
    pub fn find_trip_at_or_before(&self, timestamp: i64) -> Option<TripId> {
        let after = self.trips.partition_point(|t| t.when <= timestamp);
        after.checked_sub(1).map(|i| self.trips[i].id)
    }

    /// Give the trip a fresh id and link it at its sorted position, unless
    /// another trip already starts at exactly the same time.
    pub(crate) fn place(&mut self, mut trip: Trip) -> Placement {
        let pos = self.trips.partition_point(|t| t.when < trip.when);
        if let Some(existing) = self.trips.get(pos).filter(|t| t.when == trip.when) {
            return Placement::Duplicate {
                existing: existing.id,
                incoming: trip,
            };
        }
        self.next_id += 1;
        trip.id = TripId(self.next_id);
        let id = trip.id;
        self.trips.insert(pos, trip);
        Placement::Linked(id)
    }

    /// Unlink an empty trip.
    ///
    /// # Panics
    ///
    /// Deleting a trip that still has members, or one that is not
    /// registered, is a contract violation.
    pub(crate) fn delete(&mut self, id: TripId) -> Trip {
        let pos = self
            .trips
            .iter()
            .position(|t| t.id == id)
            .unwrap_or_else(|| panic!("delete of unregistered trip {id:?}"));
        assert!(
            self.trips[pos].dives.is_empty(),
            "delete of trip {id:?} with {} members",
            self.trips[pos].member_count()
        );
        self.trips.remove(pos)
    }

    /// Restore ordering after a trip start changed.
    pub(crate) fn resort(&mut self) {
        self.trips.sort_by_key(|t| t.when);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiveId;

    fn trip_at(when: i64) -> Trip {
        Trip {
            when,
            ..Trip::default()
        }
    }

    fn linked(placement: Placement) -> TripId {
        match placement {
            Placement::Linked(id) => id,
            Placement::Duplicate { .. } => panic!("expected a new trip"),
        }
    }

    #[test]
    fn test_place_sorted() {
        let mut registry = TripRegistry::new();
        let c = linked(registry.place(trip_at(300)));
        let a = linked(registry.place(trip_at(100)));
        let b = linked(registry.place(trip_at(200)));

        let order: Vec<TripId> = registry.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn test_place_duplicate_time() {
        let mut registry = TripRegistry::new();
        let a = linked(registry.place(trip_at(100)));
        match registry.place(trip_at(100)) {
            Placement::Duplicate { existing, incoming } => {
                assert_eq!(existing, a);
                assert_eq!(incoming.when, 100);
            }
            Placement::Linked(_) => panic!("duplicate start must not be linked"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_trip_at_or_before() {
        let mut registry = TripRegistry::new();
        assert_eq!(registry.find_trip_at_or_before(500), None);

        let a = linked(registry.place(trip_at(100)));
        let b = linked(registry.place(trip_at(200)));

        assert_eq!(registry.find_trip_at_or_before(99), None);
        assert_eq!(registry.find_trip_at_or_before(100), Some(a));
        assert_eq!(registry.find_trip_at_or_before(199), Some(a));
        assert_eq!(registry.find_trip_at_or_before(200), Some(b));
        assert_eq!(registry.find_trip_at_or_before(i64::MAX), Some(b));
    }

    #[test]
    fn test_find_by_trip_id() {
        let mut registry = TripRegistry::new();
        let a = linked(registry.place(trip_at(100)));
        registry.get_mut(a).unwrap().display_index = Some(-1);

        assert_eq!(registry.find_by_trip_id(-1), Some(a));
        assert_eq!(registry.find_by_trip_id(-2), None);
        assert_eq!(registry.find_by_trip_id(1), None);
    }

    #[test]
    fn test_delete_empty_trip() {
        let mut registry = TripRegistry::new();
        let a = linked(registry.place(trip_at(100)));
        let removed = registry.delete(a);
        assert_eq!(removed.id, a);
        assert!(registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "with 1 members")]
    fn test_delete_non_empty_trip_panics() {
        let mut registry = TripRegistry::new();
        let a = linked(registry.place(trip_at(100)));
        registry.get_mut(a).unwrap().dives.push(DiveId(1));
        registry.delete(a);
    }
}
