//! In-memory index of uploaded files, keyed by identifier.
//!
//! The index is owned by `StorageService` and shared between request handlers
//! through cheap clones. Every operation is atomic for a single identifier;
//! nothing is persisted, so the index starts empty on every run.

use crate::models::stored_file::StoredFile;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    entries: Arc<DashMap<Uuid, StoredFile>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning whatever was previously stored under its id.
    pub fn insert(&self, record: StoredFile) -> Option<StoredFile> {
        self.entries.insert(record.id, record)
    }

    /// Snapshot of the record for `id`.
    pub fn get(&self, id: &Uuid) -> Option<StoredFile> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<StoredFile> {
        self.entries.remove(id).map(|(_, record)| record)
    }

    /// Remove `record` only if the index still holds exactly that record.
    ///
    /// Used when pruning stale entries, so a record written by a concurrent
    /// request between lookup and prune is kept.
    pub fn remove_if_unchanged(&self, record: &StoredFile) -> bool {
        self.entries
            .remove_if(&record.id, |_, current| current == record)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
