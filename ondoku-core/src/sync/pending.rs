//! Bookkeeping for optimistic writes that have not been confirmed yet.

use std::collections::HashMap;

use crate::models::EntryId;

/// Which mirrored collection a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Columns,
    Entries,
}

/// What a write touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingKey {
    Schema,
    /// A whole entry document: creation or deletion.
    Entry(EntryId),
    /// One field of one entry.
    EntryField(EntryId, String),
}

impl PendingKey {
    pub fn collection(&self) -> Collection {
        match self {
            PendingKey::Schema => Collection::Columns,
            PendingKey::Entry(_) | PendingKey::EntryField(..) => Collection::Entries,
        }
    }

    pub fn entry_id(&self) -> Option<&EntryId> {
        match self {
            PendingKey::Schema => None,
            PendingKey::Entry(id) | PendingKey::EntryField(id, _) => Some(id),
        }
    }
}

pub type WriteId = u64;

/// Latest write per key. A key stays pending until a snapshot of its
/// collection arrives or its latest write completes.
#[derive(Debug, Default)]
pub struct PendingWrites {
    next_id: WriteId,
    latest: HashMap<PendingKey, WriteId>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` pending and returns the id of this write.
    pub fn record(&mut self, key: PendingKey) -> WriteId {
        self.next_id += 1;
        self.latest.insert(key, self.next_id);
        self.next_id
    }

    /// Called when write `id` finished, successfully or not. Clears the
    /// key only if no newer write to it was recorded since.
    pub fn finish(&mut self, key: &PendingKey, id: WriteId) -> bool {
        if self.latest.get(key) == Some(&id) {
            self.latest.remove(key);
            true
        } else {
            false
        }
    }

    /// A full snapshot supersedes every pending write of its collection.
    pub fn clear(&mut self, collection: Collection) {
        self.latest.retain(|key, _| key.collection() != collection);
    }

    pub fn clear_all(&mut self) {
        self.latest.clear();
    }

    pub fn is_pending(&self, key: &PendingKey) -> bool {
        self.latest.contains_key(key)
    }

    /// Whether anything about this entry is still unconfirmed.
    pub fn touches_entry(&self, id: &EntryId) -> bool {
        self.latest.keys().any(|key| key.entry_id() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(id: &str) -> PendingKey {
        PendingKey::EntryField(EntryId::from(id), "page".to_string())
    }

    #[test]
    fn test_finish_clears_latest_only() {
        let mut pending = PendingWrites::new();
        let first = pending.record(page_of("1"));
        let second = pending.record(page_of("1"));

        assert!(!pending.finish(&page_of("1"), first));
        assert!(pending.is_pending(&page_of("1")));

        assert!(pending.finish(&page_of("1"), second));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_snapshot_clears_its_collection() {
        let mut pending = PendingWrites::new();
        pending.record(PendingKey::Schema);
        pending.record(page_of("1"));
        pending.record(PendingKey::Entry(EntryId::from("2")));

        pending.clear(Collection::Entries);

        assert_eq!(pending.len(), 1);
        assert!(pending.is_pending(&PendingKey::Schema));
    }

    #[test]
    fn test_finish_after_clear_is_harmless() {
        let mut pending = PendingWrites::new();
        let id = pending.record(PendingKey::Schema);
        pending.clear(Collection::Columns);
        assert!(!pending.finish(&PendingKey::Schema, id));
    }

    #[test]
    fn test_touches_entry() {
        let mut pending = PendingWrites::new();
        pending.record(page_of("7"));
        assert!(pending.touches_entry(&EntryId::from("7")));
        assert!(!pending.touches_entry(&EntryId::from("8")));
    }
}
