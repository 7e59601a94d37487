//! StrictDB main struct and lifecycle operations.
//!
//! The [`StrictDB`] struct is the primary interface for interacting with
//! the database. It provides methods for:
//!
//! - Opening, saving and closing the database
//! - Adding, looking up and removing collections
//! - Bulk clearing of collections or their data
//!
//! Collections are held in memory while the database is open. Changes reach
//! the file only on [`StrictDB::save`] (or [`StrictDB::close`] with
//! [`Config::autosave`] set), and each save replaces the previous snapshot
//! atomically.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use strictdb::{CollectionOptions, Config, StrictDB};
//!
//! let mut db = StrictDB::open("./app.db", Config::default())?;
//!
//! let posts = db.add_collection("posts", CollectionOptions::new().unique(["slug"]))?;
//! posts.insert(serde_json::json!({"slug": "hello"}).as_object().cloned().unwrap())?;
//!
//! db.close()?; // saves, then releases the file
//! ```
//!
//! Schema-checked access goes through
//! [`CollectionInitializer`](crate::CollectionInitializer).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::collection::{Collection, CollectionOptions};
use crate::config::Config;
use crate::error::{Result, StorageError, StrictDBError};
use crate::storage::{open_storage, DatabaseMetadata, MemoryStorage, StorageEngine};

/// The main StrictDB database handle.
///
/// Create an instance with [`StrictDB::open()`] (file-backed) or
/// [`StrictDB::open_in_memory()`], and release it with [`StrictDB::close()`].
///
/// # Ownership
///
/// `StrictDB` owns its storage engine and every live collection. `close()`
/// and `delete()` consume the handle, so it cannot be used afterward.
pub struct StrictDB {
    /// Storage engine (redb file or in-process snapshot).
    storage: Box<dyn StorageEngine>,

    /// Live collections by name.
    collections: BTreeMap<String, Collection>,

    /// Configuration used to open this database.
    config: Config,
}

impl std::fmt::Debug for StrictDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrictDB")
            .field("config", &self.config)
            .field("path", &self.storage.path())
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl StrictDB {
    /// Opens or creates a StrictDB database at the specified path.
    ///
    /// Missing parent directories are created. Every collection in the
    /// persisted snapshot is loaded into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - Database file is corrupted
    /// - Database is locked by another process
    /// - Schema version doesn't match
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use strictdb::{StrictDB, Config, SyncMode};
    ///
    /// let db = StrictDB::open("./app.db", Config {
    ///     sync_mode: SyncMode::Paranoid,
    ///     ..Default::default()
    /// })?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate().map_err(StrictDBError::from)?;

        info!("Opening StrictDB");

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "Creating database directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let storage = open_storage(path, &config)?;
        let db = Self::with_storage(storage, config)?;

        info!(
            collections = db.collections.len(),
            sync_mode = ?db.config.sync_mode,
            "StrictDB opened successfully"
        );
        Ok(db)
    }

    /// Opens a database that lives only in this process.
    ///
    /// `save()` and `reload()` work as for a file, but nothing survives
    /// the handle.
    pub fn open_in_memory(config: Config) -> Result<Self> {
        config.validate().map_err(StrictDBError::from)?;
        Self::with_storage(Box::new(MemoryStorage::new()), config)
    }

    fn with_storage(storage: Box<dyn StorageEngine>, config: Config) -> Result<Self> {
        let mut db = Self {
            storage,
            collections: BTreeMap::new(),
            config,
        };
        db.load()?;
        Ok(db)
    }

    fn load(&mut self) -> Result<()> {
        let mut collections = BTreeMap::new();
        for snapshot in self.storage.load_collections()? {
            let collection = snapshot.into_collection()?;
            collections.insert(collection.name().to_string(), collection);
        }
        self.collections = collections;
        Ok(())
    }

    /// Closes the database.
    ///
    /// Saves first when [`Config::autosave`] is set. The handle is consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the final save or the storage backend fails.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing StrictDB");

        if self.config.autosave {
            self.save()?;
        }
        self.storage.close()?;

        info!("StrictDB closed successfully");
        Ok(())
    }

    /// Closes the database without saving and removes its file.
    ///
    /// An in-memory database is simply dropped.
    #[instrument(skip(self))]
    pub fn delete(self) -> Result<()> {
        let path = self.storage.path().map(Path::to_path_buf);
        self.storage.close()?;

        if let Some(path) = path {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "Database file deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::DatabaseNotFound(path).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Returns a reference to the database configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database metadata (schema version, ID, timestamps).
    #[inline]
    pub fn metadata(&self) -> &DatabaseMetadata {
        self.storage.metadata()
    }

    /// Path of the database file, `None` for an in-memory database.
    pub fn path(&self) -> Option<PathBuf> {
        self.storage.path().map(Path::to_path_buf)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Writes every collection to storage, replacing the previous snapshot.
    ///
    /// All or nothing: a failed save leaves the previous snapshot intact.
    #[instrument(skip(self))]
    pub fn save(&self) -> Result<()> {
        let collections: Vec<&Collection> = self.collections.values().collect();
        self.storage.save_collections(&collections)?;
        debug!(collections = collections.len(), "Database saved");
        Ok(())
    }

    /// Discards in-memory changes and reloads the last saved snapshot.
    #[instrument(skip(self))]
    pub fn reload(&mut self) -> Result<()> {
        self.load()?;
        debug!(collections = self.collections.len(), "Database reloaded");
        Ok(())
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Names of every live collection, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    /// Looks up a collection by name.
    pub fn get_collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Looks up a collection by name for mutation.
    pub fn get_collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections.get_mut(name)
    }

    /// Creates an empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CollectionExists`] if the name is taken.
    #[instrument(skip(self, options), fields(unique = ?options.unique))]
    pub fn add_collection(
        &mut self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<&mut Collection> {
        if self.collections.contains_key(name) {
            return Err(StorageError::CollectionExists(name.to_string()).into());
        }

        info!("Collection added");
        Ok(self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, options)))
    }

    /// Removes a collection and its records.
    ///
    /// Returns false if no collection had that name.
    #[instrument(skip(self))]
    pub fn remove_collection(&mut self, name: &str) -> bool {
        let removed = self.collections.remove(name).is_some();
        if removed {
            info!("Collection removed");
        }
        removed
    }

    /// Detaches a collection, handing it back with its records and ID
    /// counter intact.
    pub fn take_collection(&mut self, name: &str) -> Option<Collection> {
        let taken = self.collections.remove(name);
        if taken.is_some() {
            debug!(collection = name, "Collection detached");
        }
        taken
    }

    /// Attaches `collection` under its own name, returning the collection
    /// it displaced, if any.
    pub fn put_collection(&mut self, collection: Collection) -> Option<Collection> {
        debug!(collection = collection.name(), "Collection attached");
        self.collections
            .insert(collection.name().to_string(), collection)
    }

    /// Removes every collection.
    pub fn clear_collections(&mut self) {
        debug!(collections = self.collections.len(), "Clearing collections");
        self.collections.clear();
    }

    /// Empties every collection, keeping names and constraints.
    pub fn clear_data(&mut self) {
        for collection in self.collections.values_mut() {
            collection.clear();
        }
    }
}

// StrictDB is auto Send + Sync: Box<dyn StorageEngine + Send + Sync>,
// Collection, and Config are all Send + Sync.
