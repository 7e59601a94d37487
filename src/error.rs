//! Error types for StrictDB.
//!
//! StrictDB uses a hierarchical error system:
//! - `StrictDBError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`, `NotFoundError`)
//!   provide detail
//!
//! The three kinds callers usually branch on are distinguishable with the
//! predicate helpers:
//!
//! | Kind | Predicate | Raised by |
//! |------|-----------|-----------|
//! | configuration | [`StrictDBError::is_config`] | malformed initializer input, bad [`Config`](crate::Config) |
//! | validation | [`StrictDBError::is_validation`] | schema failures, uniqueness collisions, bad storage IDs |
//! | not found | [`StrictDBError::is_not_found`] | storage ID or collection does not resolve |
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use strictdb::{StrictDB, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let mut db = StrictDB::open("./app.db", Config::default())?;
//!     // ... operations that may fail ...
//!     db.close()?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::schema::SchemaViolation;

/// Result type alias for StrictDB operations.
pub type Result<T> = std::result::Result<T, StrictDBError>;

/// Top-level error enum for all StrictDB operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum StrictDBError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrictDBError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database file not found at expected path.
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// A collection with this name already exists.
    #[error("Collection already exists: {0}")]
    CollectionExists(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to StrictDBError for convenience
impl From<redb::Error> for StrictDBError {
    fn from(err: redb::Error) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for StrictDBError {
    fn from(err: redb::DatabaseError) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for StrictDBError {
    fn from(err: redb::TransactionError) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for StrictDBError {
    fn from(err: redb::CommitError) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for StrictDBError {
    fn from(err: redb::TableError) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for StrictDBError {
    fn from(err: redb::StorageError) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for StrictDBError {
    fn from(err: bincode::Error) -> Self {
        StrictDBError::Storage(StorageError::from(err))
    }
}

impl From<SchemaViolation> for StrictDBError {
    fn from(err: SchemaViolation) -> Self {
        StrictDBError::Validation(ValidationError::Schema(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A value failed a record or collection schema.
    #[error("Schema violation: {0}")]
    Schema(SchemaViolation),

    /// A unique-constrained field already holds this value in another record.
    #[error("Duplicate value for unique field '{field}': {value}")]
    DuplicateValue {
        /// Name of the unique field.
        field: String,
        /// The colliding value.
        value: Value,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// A unique-only lookup was attempted on a field without a unique constraint.
    #[error("Field '{field}' is not unique-constrained in collection '{collection}'")]
    NotUniqueField {
        /// Collection that was queried.
        collection: String,
        /// Field that was used for the lookup.
        field: String,
    },
}

impl ValidationError {
    /// Creates a duplicate value error.
    pub fn duplicate_value(field: impl Into<String>, value: Value) -> Self {
        Self::DuplicateValue {
            field: field.into(),
            value,
        }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a not-unique-field error.
    pub fn not_unique_field(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NotUniqueField {
            collection: collection.into(),
            field: field.into(),
        }
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Collection with given name not found.
    #[error("Collection not found: {0}")]
    Collection(String),

    /// No live record carries the given storage ID.
    #[error("Record not found in '{collection}': {id}")]
    Record {
        /// Collection that was searched.
        collection: String,
        /// The storage ID that did not resolve.
        id: String,
    },
}

impl NotFoundError {
    /// Creates a collection not found error.
    pub fn collection(name: impl ToString) -> Self {
        Self::Collection(name.to_string())
    }

    /// Creates a record not found error.
    pub fn record(collection: impl ToString, id: impl ToString) -> Self {
        Self::Record {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = StrictDBError::config("unique field names must be strings");
        assert_eq!(
            err.to_string(),
            "Configuration error: unique field names must be strings"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::SchemaVersionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: expected 2, found 1"
        );
    }

    #[test]
    fn test_duplicate_value_display() {
        let err = ValidationError::duplicate_value("slug", json!("a"));
        assert_eq!(
            err.to_string(),
            "Duplicate value for unique field 'slug': \"a\""
        );
    }

    #[test]
    fn test_not_found_error_display() {
        let err = NotFoundError::record("posts", 42);
        assert_eq!(err.to_string(), "Record not found in 'posts': 42");
    }

    #[test]
    fn test_is_not_found() {
        let err: StrictDBError = NotFoundError::collection("posts").into();
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_is_validation() {
        let err: StrictDBError = ValidationError::required_field("_id").into();
        assert!(err.is_validation());
        assert!(!err.is_not_found());
        assert!(!err.is_config());
    }

    #[test]
    fn test_schema_violation_converts_to_validation() {
        let err: StrictDBError = SchemaViolation::new("slug", "is required").into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("slug"));
    }

    #[test]
    fn test_error_conversion_chain() {
        fn inner() -> Result<()> {
            Err(StorageError::corrupted("test corruption"))?
        }

        let result = inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_storage());
    }
}
