//! In-process storage backend.
//!
//! Holds the last saved snapshot in memory. Nothing survives the process,
//! but save/reload semantics match [`RedbStorage`](super::RedbStorage), so
//! it is a drop-in backend for tests and scratch databases.

use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use super::{CollectionSnapshot, DatabaseMetadata, StorageEngine};
use crate::collection::Collection;
use crate::error::Result;

/// Storage engine that keeps the snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    metadata: DatabaseMetadata,
    snapshot: Mutex<Vec<CollectionSnapshot>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageEngine for MemoryStorage {
    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn load_collections(&self) -> Result<Vec<CollectionSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save_collections(&self, collections: &[&Collection]) -> Result<()> {
        let snapshot: Vec<CollectionSnapshot> = collections
            .iter()
            .map(|c| CollectionSnapshot::of(c))
            .collect();
        debug!(collections = snapshot.len(), "Snapshot kept in memory");
        *self.snapshot.lock() = snapshot;
        Ok(())
    }
}
