//! Storage-owned record fields.
//!
//! Every live record carries two fields that belong to the collection, not
//! to the application:
//!
//! - [`ID_FIELD`] (`_id`): the storage ID assigned on insert
//! - [`META_FIELD`] (`meta`): engine bookkeeping ([`RecordMeta`])
//!
//! Application payloads cross the validation boundary without them: they
//! are stripped before schema validation and re-attached from the existing
//! record afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::{StorageId, Timestamp};

/// A JSON-compatible record: field name to value.
pub type Document = Map<String, Value>;

/// Field holding the storage ID.
pub const ID_FIELD: &str = "_id";

/// Field holding the engine metadata.
pub const META_FIELD: &str = "meta";

/// Engine-owned bookkeeping attached to every live record.
///
/// Written on insert, bumped on update; whatever a caller supplies in the
/// `meta` field is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Number of updates applied since insert.
    pub revision: u64,

    /// When the record was inserted.
    pub created: Timestamp,

    /// When the record was last updated, if ever.
    pub updated: Option<Timestamp>,

    /// Record format version.
    pub version: u32,
}

impl RecordMeta {
    /// Metadata for a freshly inserted record.
    pub fn new() -> Self {
        Self {
            revision: 0,
            created: Timestamp::now(),
            updated: None,
            version: 0,
        }
    }

    /// Returns this metadata advanced by one update.
    pub fn bumped(&self) -> Self {
        Self {
            revision: self.revision + 1,
            updated: Some(Timestamp::now()),
            ..*self
        }
    }

    /// Reads metadata back out of a stored document.
    ///
    /// Returns `None` if the field is absent or malformed.
    pub fn from_document(doc: &Document) -> Option<Self> {
        doc.get(META_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Converts to the JSON shape stored in the `meta` field.
    pub fn to_value(&self) -> Value {
        // Plain struct of integers, serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a copy of `doc` without `_id` and `meta`.
pub fn strip_storage_fields(doc: &Document) -> Document {
    doc.iter()
        .filter(|(k, _)| !is_storage_field(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Removes `_id` and `meta` from `doc` in place.
pub fn remove_storage_fields(doc: &mut Document) {
    doc.remove(ID_FIELD);
    doc.remove(META_FIELD);
}

/// Returns true for the two storage-owned field names.
#[inline]
pub fn is_storage_field(name: &str) -> bool {
    name == ID_FIELD || name == META_FIELD
}

/// Reads the storage ID a document claims to have.
///
/// `Ok(None)` when the field is absent or null; an error when it is
/// present but not a positive integer.
pub fn storage_id_of(doc: &Document) -> Result<Option<StorageId>, ValidationError> {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => StorageId::from_value(value).map(Some),
    }
}

/// Like [`storage_id_of`], but absence is an error.
pub fn require_storage_id(doc: &Document) -> Result<StorageId, ValidationError> {
    storage_id_of(doc)?.ok_or_else(|| ValidationError::required_field(ID_FIELD))
}

/// Overwrites `_id` and `meta` in `target` with the values held by `source`.
///
/// Fields absent from `source` are removed from `target`, so the result
/// never carries caller-supplied storage fields.
pub fn copy_storage_fields(target: &mut Document, source: &Document) {
    for field in [ID_FIELD, META_FIELD] {
        match source.get(field) {
            Some(value) => {
                target.insert(field.to_string(), value.clone());
            }
            None => {
                target.remove(field);
            }
        }
    }
}

/// Text form of `value` used as a uniqueness key.
///
/// Object keys are sorted at every depth, so two values that compare equal
/// always produce the same key regardless of field order. Distinct JSON
/// types never share a key (`1` and `"1"` differ).
pub fn unique_key(value: &Value) -> String {
    canonical(value).to_string()
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
