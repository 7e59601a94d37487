//! Storage layer abstractions for StrictDB.
//!
//! Collections live in memory while the database is open; the storage
//! engine persists and restores whole snapshots of them. Each
//! [`save_collections`](StorageEngine::save_collections) call replaces the
//! previous snapshot atomically.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StrictDB                                │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageEngine     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                    ▲         ▲                              │
//! │                    │         │                              │
//! │         ┌─────────┴─┐   ┌───┴───────────┐                  │
//! │         │RedbStorage│   │ MemoryStorage │                  │
//! │         └───────────┘   └───────────────┘                  │
//! │           (file)           (in-process)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod redb;
pub mod schema;

pub use self::memory::MemoryStorage;
pub use self::redb::RedbStorage;
pub use schema::{DatabaseMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::collection::{Collection, CollectionState};
use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::record::Document;

/// One persisted collection: its name, state, and records.
#[derive(Clone, Debug)]
pub struct CollectionSnapshot {
    /// Collection name.
    pub name: String,

    /// Options and ID high-water mark.
    pub state: CollectionState,

    /// Records in storage ID order, storage fields included.
    pub records: Vec<Document>,
}

impl CollectionSnapshot {
    /// Captures the current contents of a collection.
    pub fn of(collection: &Collection) -> Self {
        Self {
            name: collection.name().to_string(),
            state: collection.state(),
            records: collection.documents(),
        }
    }

    /// Rebuilds the live collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the records are inconsistent
    /// with the state (see [`Collection::from_parts`]).
    pub fn into_collection(self) -> std::result::Result<Collection, StorageError> {
        Collection::from_parts(self.name, self.state, self.records)
    }
}

/// Storage engine trait for StrictDB.
///
/// This trait defines the contract that any storage backend must implement.
/// The primary implementation is [`RedbStorage`]; [`MemoryStorage`] keeps
/// the snapshot in process for tests and ephemeral databases.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow the database to be moved
/// across threads.
pub trait StorageEngine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the database metadata.
    fn metadata(&self) -> &DatabaseMetadata;

    /// Closes the storage engine, flushing any pending writes.
    ///
    /// This method consumes the storage engine.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the path to the database file, if applicable.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    /// Loads every persisted collection.
    ///
    /// Returns an empty vector for a fresh database.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction or deserialization fails.
    fn load_collections(&self) -> Result<Vec<CollectionSnapshot>>;

    /// Replaces the persisted snapshot with `collections`.
    ///
    /// Either the whole snapshot is written or nothing changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or serialization fails.
    fn save_collections(&self, collections: &[&Collection]) -> Result<()>;
}

/// Opens a storage engine at the given path.
///
/// This is a convenience function that creates a [`RedbStorage`] instance.
/// For more control, use `RedbStorage::open()` directly.
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
/// - Schema version doesn't match
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn StorageEngine>> {
    let storage = RedbStorage::open(path, config)?;
    Ok(Box::new(storage))
}
