//! # StrictDB
//!
//! Embedded document collections that cannot hold invalid data.
//!
//! StrictDB keeps named collections of JSON documents and guarantees that
//! every record written through its validated API satisfies a record schema
//! and the collection's unique fields. When an application starts requiring
//! different unique fields than a persisted collection enforces, the
//! collection is rebuilt: its data is validated under the new constraints
//! first, and only then replayed into a fresh collection.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strictdb::prelude::*;
//! use strictdb::schema::{FieldType, ObjectSchema};
//!
//! let mut db = StrictDB::open("./app.db", Config::default())?;
//!
//! let users = CollectionInitializer::new("users", "email")?
//!     .record_schema(ObjectSchema::new().required("email", FieldType::String));
//!
//! let mut collection = users.initialize(&mut db)?;
//! collection.validate_and_insert(record)?;
//!
//! db.close()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Storage fields
//!
//! Every stored record carries two fields owned by the engine: `_id`, a
//! positive integer assigned on insert and never reused, and `meta`, with a
//! revision counter and timestamps. Validated writes never let a caller
//! set either.
//!
//! ### Initializer
//!
//! A [`CollectionInitializer`] is the requirement for one collection. Its
//! [`initialize`](CollectionInitializer::initialize) creates, keeps or
//! rebuilds the collection and returns a [`ValidatedCollection`].
//!
//! ### Persistence
//!
//! Collections live in memory while the database is open.
//! [`StrictDB::save`] writes them to a [redb](https://docs.rs/redb) file in
//! one transaction.
//!
//! ## Thread Safety
//!
//! `StrictDB` is `Send + Sync`, but mutation takes `&mut self`; callers
//! that share a database across threads serialize access themselves.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod collection;
mod config;
mod db;
mod error;
mod initializer;
mod types;
mod validated;

pub mod introspect;
pub mod record;
pub mod schema;
pub mod storage;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main database interface
pub use db::StrictDB;

// Configuration
pub use config::{Config, SyncMode};

// Error handling
pub use error::{NotFoundError, Result, StorageError, StrictDBError, ValidationError};

// Core types
pub use types::{DatabaseId, StorageId, Timestamp};

// Collections and records
pub use collection::{Collection, CollectionOptions, CollectionState};
pub use record::{Document, RecordMeta, ID_FIELD, META_FIELD};

// Validation layer
pub use initializer::{CollectionInitializer, LifecycleHook};
pub use schema::{Schema, SchemaViolation};
pub use validated::ValidatedCollection;

// Storage (for advanced users)
pub use storage::DatabaseMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common StrictDB usage.
///
/// ```rust
/// use strictdb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::collection::CollectionOptions;
    pub use crate::config::{Config, SyncMode};
    pub use crate::db::StrictDB;
    pub use crate::error::{Result, StrictDBError};
    pub use crate::initializer::CollectionInitializer;
    pub use crate::record::Document;
    pub use crate::schema::Schema;
    pub use crate::validated::ValidatedCollection;
}
