//! Core type definitions for StrictDB identifiers and timestamps.
//!
//! Storage IDs are small positive integers assigned by a collection on
//! insert. Database IDs use UUID v7 so that a file can be told apart from
//! a copy created at a different time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::record::ID_FIELD;

/// Storage identifier of a live record.
///
/// Assigned by the collection on insertion, unique within the collection,
/// and never reused after removal within the same collection instance.
/// Always positive.
///
/// # Example
/// ```
/// use strictdb::StorageId;
/// use serde_json::json;
///
/// let id = StorageId::from_value(&json!(7)).unwrap();
/// assert_eq!(id.get(), 7);
/// assert!(StorageId::from_value(&json!(0)).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageId(u64);

impl StorageId {
    /// Creates a storage ID, rejecting zero.
    pub fn new(id: u64) -> Result<Self, ValidationError> {
        if id == 0 {
            return Err(ValidationError::invalid_field(
                ID_FIELD,
                "must be a positive integer, got 0",
            ));
        }
        Ok(Self(id))
    }

    /// Parses a storage ID out of a JSON value.
    ///
    /// Only positive integers are accepted; strings, floats, negatives and
    /// zero all fail with [`ValidationError::InvalidField`].
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        match value.as_u64() {
            Some(id) => Self::new(id),
            None => Err(ValidationError::invalid_field(
                ID_FIELD,
                format!("must be a positive integer, got {}", value),
            )),
        }
    }

    /// Returns the raw integer.
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the storage ID that follows this one.
    #[inline]
    pub(crate) const fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Creates a storage ID without the positivity check.
    ///
    /// Only for values read back from storage keys.
    #[inline]
    pub(crate) const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl From<StorageId> for Value {
    fn from(id: StorageId) -> Self {
        Value::from(id.0)
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier (UUID v7 for time-ordering).
///
/// Generated once when a database file is created and persisted in its
/// metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseId(pub Uuid);

impl DatabaseId {
    /// Creates a new DatabaseId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) DatabaseId.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for DatabaseId {
    /// Returns a nil (all zeros) DatabaseId.
    ///
    /// For a new unique ID, use [`DatabaseId::new()`].
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch, returns a timestamp of
    /// 0 rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
