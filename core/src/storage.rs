use crate::models::{Dive, DiveId};

/// Chronologically ordered dive table.
///
/// Positions are only stable until a dive is inserted or deleted; use the
/// `DiveId` handed out by [`DiveStore::insert`] to refer to a dive across
/// mutations.
#[derive(Clone, Debug, Default)]
pub struct DiveStore {
    dives: Vec<Dive>,
    next_id: u64,
}

impl DiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.dives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dives.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Dive> {
        self.dives.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Dive> {
        self.dives.get_mut(index)
    }

    pub fn index_of(&self, id: DiveId) -> Option<usize> {
        self.dives.iter().position(|d| d.id == id)
    }

    pub fn dive(&self, id: DiveId) -> Option<&Dive> {
        self.dives.iter().find(|d| d.id == id)
    }

    pub fn dive_mut(&mut self, id: DiveId) -> Option<&mut Dive> {
        self.dives.iter_mut().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Dive> {
        self.dives.iter()
    }

    /// Snapshot of the current order, safe to walk while mutating the store.
    pub fn ids(&self) -> Vec<DiveId> {
        self.dives.iter().map(|d| d.id).collect()
    }

    /// Insert after every dive starting at or before this one.
    pub fn insert(&mut self, dive: Dive) -> DiveId {
        let index = self
            .dives
            .partition_point(|d| d.start_time_unix <= dive.start_time_unix);
        self.insert_at(index, dive)
    }

    /// Insert at an explicit position. Callers keep the table ordered.
    pub fn insert_at(&mut self, index: usize, mut dive: Dive) -> DiveId {
        self.next_id += 1;
        dive.id = DiveId(self.next_id);
        let id = dive.id;
        self.dives.insert(index.min(self.dives.len()), dive);
        id
    }

    /// Remove a dive, shifting every later position down by one.
    pub fn remove(&mut self, id: DiveId) -> Option<Dive> {
        let index = self.index_of(id)?;
        Some(self.dives.remove(index))
    }

    /// Restore chronological order after a start time changed.
    pub fn resort(&mut self) {
        self.dives.sort_by_key(|d| d.start_time_unix);
    }
}
