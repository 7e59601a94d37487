//! redb storage engine implementation.
//!
//! This module provides the primary storage backend for StrictDB using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//!
//! A snapshot save runs in one write transaction: the collection and record
//! tables are dropped and rewritten, so a crash mid-save leaves the previous
//! snapshot in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::redb::{Database, ReadableTable};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    DatabaseMetadata, COLLECTIONS_TABLE, METADATA_TABLE, RECORDS_TABLE, SCHEMA_VERSION,
};
use super::{CollectionSnapshot, StorageEngine};
use crate::collection::{Collection, CollectionState};
use crate::config::{Config, SyncMode};
use crate::error::{Result, StorageError, StrictDBError};
use crate::record::Document;

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

/// redb storage engine wrapper.
///
/// This struct holds the redb database handle and cached metadata.
/// It implements [`StorageEngine`] for use with StrictDB.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,

    /// Durability applied to snapshot writes.
    sync_mode: SyncMode,
}

impl RedbStorage {
    /// Opens or creates a database at the given path.
    ///
    /// If the database doesn't exist, it will be created and initialized.
    /// If it exists, its schema version is checked.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use strictdb::{Config, storage::RedbStorage};
    ///
    /// let storage = RedbStorage::open("./app.db", &Config::default())?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening storage engine");

        let db = Self::create_database(path, config)?;

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database with appropriate settings.
    fn create_database(path: &Path, config: &Config) -> Result<Database> {
        let mut builder = Database::builder();
        builder.set_cache_size(config.cache_size_bytes());

        // redb doesn't expose a typed error variant for lock conflicts,
        // so we detect them via the error message.
        let db = builder.create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new database with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new database");

        let metadata = DatabaseMetadata::new();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            // Create other tables (they're created on first access)
            let _ = write_txn.open_table(COLLECTIONS_TABLE)?;
            let _ = write_txn.open_table(RECORDS_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            database_id = %metadata.database_id,
            "Database initialized"
        );

        Ok(Self {
            db,
            metadata,
            path,
            sync_mode: config.sync_mode,
        })
    }

    /// Opens and validates an existing database.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing database");

        let read_txn = db.begin_read().map_err(StorageError::from)?;

        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };

        drop(read_txn);

        if metadata.schema_version != SCHEMA_VERSION {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(StrictDBError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            database_id = %metadata.database_id,
            "Database opened successfully"
        );

        Ok(Self {
            db,
            metadata,
            path,
            sync_mode: config.sync_mode,
        })
    }

    /// Returns a reference to the underlying redb database.
    #[inline]
    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }
}

impl StorageEngine for RedbStorage {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing storage engine");

        // redb flushes all data durably on drop.
        drop(self.db);

        info!("Storage engine closed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    #[instrument(skip(self))]
    fn load_collections(&self) -> Result<Vec<CollectionSnapshot>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;

        let mut snapshots = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        {
            let table = read_txn.open_table(COLLECTIONS_TABLE)?;
            for result in table.iter()? {
                let (name, value) = result.map_err(StorageError::from)?;
                let state: CollectionState =
                    bincode::deserialize(value.value()).map_err(|e| {
                        StorageError::corrupted(format!(
                            "Invalid state for collection '{}': {}",
                            name.value(),
                            e
                        ))
                    })?;
                positions.insert(name.value().to_string(), snapshots.len());
                snapshots.push(CollectionSnapshot {
                    name: name.value().to_string(),
                    state,
                    records: Vec::new(),
                });
            }
        }

        {
            let table = read_txn.open_table(RECORDS_TABLE)?;
            for result in table.iter()? {
                let (key, value) = result.map_err(StorageError::from)?;
                let (name, id) = key.value();
                let position = *positions.get(name).ok_or_else(|| {
                    StorageError::corrupted(format!(
                        "Record {} belongs to unknown collection '{}'",
                        id, name
                    ))
                })?;
                let doc: Document = serde_json::from_slice(value.value()).map_err(|e| {
                    StorageError::corrupted(format!(
                        "Invalid record {} in collection '{}': {}",
                        id, name, e
                    ))
                })?;
                snapshots[position].records.push(doc);
            }
        }

        let records: usize = snapshots.iter().map(|s| s.records.len()).sum();
        debug!(collections = snapshots.len(), records, "Snapshot loaded");
        Ok(snapshots)
    }

    #[instrument(skip(self, collections), fields(collections = collections.len()))]
    fn save_collections(&self, collections: &[&Collection]) -> Result<()> {
        let mut write_txn = self.db.begin_write().map_err(StorageError::from)?;
        write_txn.set_durability(self.sync_mode.durability());
        write_txn.set_two_phase_commit(self.sync_mode.two_phase_commit());

        write_txn.delete_table(COLLECTIONS_TABLE)?;
        write_txn.delete_table(RECORDS_TABLE)?;

        let mut records = 0usize;
        {
            let mut state_table = write_txn.open_table(COLLECTIONS_TABLE)?;
            let mut record_table = write_txn.open_table(RECORDS_TABLE)?;

            for collection in collections {
                let state_bytes = bincode::serialize(&collection.state())
                    .map_err(|e| StorageError::serialization(e.to_string()))?;
                state_table.insert(collection.name(), state_bytes.as_slice())?;

                for doc in collection.iter() {
                    let id = crate::record::require_storage_id(doc).map_err(|e| {
                        StorageError::corrupted(format!(
                            "collection '{}': {}",
                            collection.name(),
                            e
                        ))
                    })?;
                    let bytes = serde_json::to_vec(doc).map_err(StorageError::from)?;
                    record_table.insert((collection.name(), id.get()), bytes.as_slice())?;
                    records += 1;
                }
            }
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(records, "Snapshot saved");
        Ok(())
    }
}

// RedbStorage is auto Send + Sync: Database, DatabaseMetadata, PathBuf and
// SyncMode are all Send + Sync.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionOptions;
    use serde_json::json;
    use tempfile::tempdir;

    fn default_config() -> Config {
        Config::default()
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn posts() -> Collection {
        let mut c = Collection::new("posts", CollectionOptions::new().unique(["slug"]));
        c.insert(doc(json!({"slug": "a", "content": "123"}))).unwrap();
        c.insert(doc(json!({"slug": "b", "content": "456"}))).unwrap();
        c
    }

    #[test]
    fn test_open_creates_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        assert!(!path.exists());

        let storage = RedbStorage::open(&path, &default_config()).unwrap();

        assert!(path.exists());
        assert_eq!(storage.metadata().schema_version, SCHEMA_VERSION);

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_open_existing_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let storage = RedbStorage::open(&path, &default_config()).unwrap();
        let created_at = storage.metadata().created_at;
        let database_id = storage.metadata().database_id;
        Box::new(storage).close().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let storage = RedbStorage::open(&path, &default_config()).unwrap();

        assert_eq!(storage.metadata().created_at, created_at);
        assert_eq!(storage.metadata().database_id, database_id);
        assert!(storage.metadata().last_opened_at > created_at);

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_all_tables_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let storage = RedbStorage::open(&path, &default_config()).unwrap();

        let read_txn = storage.database().begin_read().unwrap();
        read_txn.open_table(METADATA_TABLE).unwrap();
        read_txn.open_table(COLLECTIONS_TABLE).unwrap();
        read_txn.open_table(RECORDS_TABLE).unwrap();
        drop(read_txn);

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_fresh_database_loads_nothing() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.db"), &default_config()).unwrap();
        assert!(storage.load_collections().unwrap().is_empty());
        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let storage = RedbStorage::open(&path, &default_config()).unwrap();

        let c = posts();
        let empty = Collection::new("empty", CollectionOptions::new().indices(["x"]));
        storage.save_collections(&[&c, &empty]).unwrap();
        Box::new(storage).close().unwrap();

        let storage = RedbStorage::open(&path, &default_config()).unwrap();
        let mut loaded = storage.load_collections().unwrap();
        loaded.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(loaded.len(), 2);

        assert_eq!(loaded[0].name, "empty");
        assert!(loaded[0].records.is_empty());
        assert_eq!(loaded[0].state.options.indices, vec!["x".to_string()]);

        assert_eq!(loaded[1].name, "posts");
        assert_eq!(loaded[1].state, c.state());
        assert_eq!(loaded[1].records, c.documents());

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.db"), &default_config()).unwrap();

        let c = posts();
        storage.save_collections(&[&c]).unwrap();

        let other = Collection::new("other", CollectionOptions::new());
        storage.save_collections(&[&other]).unwrap();

        let loaded = storage.load_collections().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "other");

        // No orphan records from the first snapshot
        let read_txn = storage.database().begin_read().unwrap();
        let table = read_txn.open_table(RECORDS_TABLE).unwrap();
        assert_eq!(table.iter().unwrap().count(), 0);
        drop(table);
        drop(read_txn);

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_uncommitted_transaction_is_invisible() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.db"), &default_config()).unwrap();

        {
            let write_txn = storage.database().begin_write().unwrap();
            {
                let mut table = write_txn.open_table(COLLECTIONS_TABLE).unwrap();
                let state = bincode::serialize(&posts().state()).unwrap();
                table.insert("phantom", state.as_slice()).unwrap();
            }
            // write_txn is dropped here without commit() -- rolled back
        }

        assert!(storage.load_collections().unwrap().is_empty());

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_orphan_record_is_corruption() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.db"), &default_config()).unwrap();

        let write_txn = storage.database().begin_write().unwrap();
        {
            let mut table = write_txn.open_table(RECORDS_TABLE).unwrap();
            table.insert(("ghost", 1u64), b"{}".as_slice()).unwrap();
        }
        write_txn.commit().unwrap();

        let err = storage.load_collections().unwrap_err();
        assert!(matches!(
            err,
            StrictDBError::Storage(StorageError::Corrupted(ref msg)) if msg.contains("ghost")
        ));

        Box::new(storage).close().unwrap();
    }

    #[test]
    fn test_corruption_detection_invalid_metadata_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.db");

        let storage = RedbStorage::open(&path, &default_config()).unwrap();
        let write_txn = storage.database().begin_write().unwrap();
        {
            let mut meta = write_txn.open_table(METADATA_TABLE).unwrap();
            meta.insert(METADATA_KEY, b"not-valid-bincode-data".as_slice())
                .unwrap();
        }
        write_txn.commit().unwrap();
        Box::new(storage).close().unwrap();

        let result = RedbStorage::open(&path, &default_config());
        match result {
            Err(StrictDBError::Storage(StorageError::Corrupted(msg))) => {
                assert!(
                    msg.contains("Invalid metadata format"),
                    "Error should mention invalid format, got: {}",
                    msg
                );
            }
            other => panic!("Expected StorageError::Corrupted, got: {:?}", other),
        }
    }

    #[test]
    fn test_corruption_detection_missing_metadata_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_table.db");

        {
            let db = ::redb::Database::create(&path).unwrap();
            let write_txn = db.begin_write().unwrap();
            {
                let dummy: ::redb::TableDefinition<&str, &str> =
                    ::redb::TableDefinition::new("dummy");
                let mut table = write_txn.open_table(dummy).unwrap();
                table.insert("key", "value").unwrap();
            }
            write_txn.commit().unwrap();
        }

        let result = RedbStorage::open(&path, &default_config());
        match result {
            Err(StrictDBError::Storage(StorageError::Corrupted(msg))) => {
                assert!(
                    msg.contains("Cannot open metadata table"),
                    "Error should mention metadata table, got: {}",
                    msg
                );
            }
            other => panic!("Expected StorageError::Corrupted, got: {:?}", other),
        }
    }

    #[test]
    fn test_schema_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.db");

        let storage = RedbStorage::open(&path, &default_config()).unwrap();
        let mut metadata = storage.metadata().clone();
        metadata.schema_version = SCHEMA_VERSION + 1;
        let write_txn = storage.database().begin_write().unwrap();
        {
            let mut meta = write_txn.open_table(METADATA_TABLE).unwrap();
            let bytes = bincode::serialize(&metadata).unwrap();
            meta.insert(METADATA_KEY, bytes.as_slice()).unwrap();
        }
        write_txn.commit().unwrap();
        Box::new(storage).close().unwrap();

        let err = RedbStorage::open(&path, &default_config()).unwrap_err();
        assert!(matches!(
            err,
            StrictDBError::Storage(StorageError::SchemaVersionMismatch { .. })
        ));
    }
}
