//! Unique-value index for a single field.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::{unique_key, Document};
use crate::types::StorageId;

/// Maps each non-null value of one field to the record holding it.
///
/// Values are keyed by [`unique_key`], so `1` and `"1"` are distinct while
/// equal JSON values always collide, whatever their object key order.
#[derive(Clone, Debug, Default)]
pub(crate) struct UniqueIndex {
    field: String,
    keys: HashMap<String, StorageId>,
}

impl UniqueIndex {
    pub(crate) fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            keys: HashMap::new(),
        }
    }

    /// Name of the indexed field.
    pub(crate) fn field(&self) -> &str {
        &self.field
    }

    /// Returns the indexable value of this field in `doc`, if any.
    pub(crate) fn value_of<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        doc.get(&self.field).filter(|v| !v.is_null())
    }

    /// Looks up the record holding `value`.
    pub(crate) fn get(&self, value: &Value) -> Option<StorageId> {
        if value.is_null() {
            return None;
        }
        self.keys.get(&unique_key(value)).copied()
    }

    /// Returns the record other than `exclude` that already holds the value
    /// `doc` carries for this field.
    pub(crate) fn conflict<'a>(
        &self,
        doc: &'a Document,
        exclude: Option<StorageId>,
    ) -> Option<&'a Value> {
        let value = self.value_of(doc)?;
        match self.get(value) {
            Some(holder) if Some(holder) != exclude => Some(value),
            _ => None,
        }
    }

    pub(crate) fn insert(&mut self, id: StorageId, doc: &Document) {
        if let Some(value) = self.value_of(doc) {
            self.keys.insert(unique_key(value), id);
        }
    }

    pub(crate) fn remove(&mut self, id: StorageId, doc: &Document) {
        if let Some(value) = self.value_of(doc) {
            let key = unique_key(value);
            if self.keys.get(&key) == Some(&id) {
                self.keys.remove(&key);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}
