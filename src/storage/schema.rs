//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb storage engine.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "db_metadata" -> DatabaseMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ COLLECTIONS_TABLE                                            │
//! │   Key: &str (collection name)                                │
//! │   Value: &[u8] (bincode-serialized CollectionState)          │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RECORDS_TABLE                                                │
//! │   Key: (&str, u64) (collection name, storage ID)             │
//! │   Value: &[u8] (JSON document, storage fields included)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents are stored as JSON rather than bincode because they are
//! self-describing maps; bincode cannot round-trip arbitrary JSON values.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::types::{DatabaseId, Timestamp};

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Collections table.
///
/// Key: collection name
/// Value: bincode-serialized CollectionState
pub const COLLECTIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

/// Records table.
///
/// Key: (collection name, storage ID); iteration order groups records by
/// collection and sorts them by storage ID within it.
/// Value: JSON document bytes
pub const RECORDS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("records");

// ============================================================================
// Database Metadata
// ============================================================================

/// Database metadata stored in the metadata table.
///
/// This is serialized with bincode and stored under the key "db_metadata".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Identifier generated when the database was created.
    pub database_id: DatabaseId,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            database_id: DatabaseId::new(),
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

impl Default for DatabaseMetadata {
    fn default() -> Self {
        Self::new()
    }
}
