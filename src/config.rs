//! Configuration types for StrictDB.
//!
//! The [`Config`] struct controls database-level behavior:
//! - Durability of persisted snapshots
//! - Cache size of the storage engine
//! - Whether `close()` saves pending changes
//!
//! Per-collection requirements (unique fields, schemas, lifecycle hooks)
//! live on [`CollectionInitializer`](crate::CollectionInitializer) instead.
//!
//! # Example
//! ```rust
//! use strictdb::{Config, SyncMode};
//!
//! // Use defaults (64 MB cache, normal durability, autosave on close)
//! let config = Config::default();
//!
//! // Customize for tests
//! let config = Config {
//!     sync_mode: SyncMode::Fast,
//!     autosave: false,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Database configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use strictdb::Config;
///
/// let config = Config {
///     cache_size_mb: 256,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Cache size in megabytes for the storage engine.
    ///
    /// Default: 64 MB
    pub cache_size_mb: usize,

    /// Durability mode for [`save`](crate::StrictDB::save).
    pub sync_mode: SyncMode,

    /// Save in-memory state when the database is closed.
    ///
    /// Default: `true`
    pub autosave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_size_mb: 64,
            sync_mode: SyncMode::Normal,
            autosave: true,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `StrictDB::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if `cache_size_mb` is 0.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache_size_mb == 0 {
            return Err(ValidationError::invalid_field(
                "cache_size_mb",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Returns the cache size in bytes.
    pub fn cache_size_bytes(&self) -> usize {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Durability mode for write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    ///
    /// This is the default and recommended setting.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose the last save on crash).
    Fast,

    /// Sync with extra integrity checks (slowest, maximum durability).
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode uses the strictest durability.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }

    /// The redb durability level for this mode.
    ///
    /// Paranoid commits are immediate; the extra integrity comes from
    /// [`two_phase_commit`](Self::two_phase_commit).
    pub(crate) fn durability(&self) -> redb::Durability {
        match self {
            Self::Normal | Self::Paranoid => redb::Durability::Immediate,
            Self::Fast => redb::Durability::Eventual,
        }
    }

    /// Whether commits go through redb's two-phase commit.
    pub(crate) fn two_phase_commit(&self) -> bool {
        self.is_paranoid()
    }
}
