//! Raw document collections.
//!
//! A [`Collection`] is a named, unordered set of [`Document`]s. It owns
//! storage IDs and record metadata, and enforces its unique fields on every
//! write, but knows nothing about schemas. Schema-checked access goes
//! through [`ValidatedCollection`](crate::ValidatedCollection).
//!
//! # Write semantics
//!
//! | Operation | Storage ID | `meta` | Unique fields |
//! |-----------|-----------|--------|---------------|
//! | [`insert`](Collection::insert) | assigned (`last + 1`) | fresh | checked against all records |
//! | [`update`](Collection::update) | must be live | revision bumped | checked against all other records |
//! | [`remove`](Collection::remove) | must be live | - | entries released |
//!
//! A failed write leaves the collection unchanged.

mod index;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{NotFoundError, Result, StorageError, ValidationError};
use crate::record::{
    remove_storage_fields, require_storage_id, Document, RecordMeta, ID_FIELD, META_FIELD,
};
use crate::types::StorageId;
use serde_json::Value;

use index::UniqueIndex;

/// Constraint configuration of a collection.
///
/// # Example
/// ```rust
/// use strictdb::CollectionOptions;
///
/// let options = CollectionOptions::new()
///     .unique(["slug"])
///     .indices(["published_at"]);
/// assert_eq!(options.unique, vec!["slug".to_string()]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Fields no two records may share a non-null value for.
    pub unique: Vec<String>,

    /// Fields carrying a lookup index.
    pub indices: Vec<String>,
}

impl CollectionOptions {
    /// Options with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unique fields.
    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the indexed fields.
    pub fn indices<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Removes duplicate names, keeping first occurrences.
    fn normalized(mut self) -> Self {
        dedup_in_order(&mut self.unique);
        dedup_in_order(&mut self.indices);
        self
    }
}

fn dedup_in_order(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    names.retain(|n| seen.insert(n.clone()));
}

/// Persisted per-collection state other than the records themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    /// Constraint configuration.
    pub options: CollectionOptions,

    /// Highest storage ID ever assigned, 0 if none.
    pub last_id: u64,
}

/// A named set of documents with engine-enforced unique fields.
#[derive(Clone, Debug)]
pub struct Collection {
    name: String,
    options: CollectionOptions,
    records: BTreeMap<StorageId, Document>,
    unique: Vec<UniqueIndex>,
    last_id: u64,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        let options = options.normalized();
        let unique = options.unique.iter().map(UniqueIndex::new).collect();
        Self {
            name: name.into(),
            options,
            records: BTreeMap::new(),
            unique,
            last_id: 0,
        }
    }

    /// Reassembles a collection from persisted parts.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if a record lacks a valid storage
    /// ID, two records share an ID, an ID exceeds `last_id`, or the records
    /// violate a unique field.
    pub fn from_parts(
        name: impl Into<String>,
        state: CollectionState,
        records: Vec<Document>,
    ) -> std::result::Result<Self, StorageError> {
        let mut collection = Self::new(name, state.options);
        collection.last_id = state.last_id;

        for doc in records {
            let id = require_storage_id(&doc).map_err(|e| {
                StorageError::corrupted(format!("collection '{}': {}", collection.name, e))
            })?;
            if id.get() > collection.last_id {
                return Err(StorageError::corrupted(format!(
                    "collection '{}': storage ID {} exceeds last assigned ID {}",
                    collection.name, id, collection.last_id
                )));
            }
            if collection.records.contains_key(&id) {
                return Err(StorageError::corrupted(format!(
                    "collection '{}': storage ID {} appears twice",
                    collection.name, id
                )));
            }
            if let Some((field, value)) = collection.first_conflict(&doc, None) {
                return Err(StorageError::corrupted(format!(
                    "collection '{}': duplicate value {} for unique field '{}'",
                    collection.name, value, field
                )));
            }
            collection.index_insert(id, &doc);
            collection.records.insert(id, doc);
        }

        Ok(collection)
    }

    /// Returns the persisted state (options and ID high-water mark).
    pub fn state(&self) -> CollectionState {
        CollectionState {
            options: self.options.clone(),
            last_id: self.last_id,
        }
    }

    /// Collection name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constraint configuration.
    #[inline]
    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// Fields enforced as unique.
    #[inline]
    pub fn unique_field_names(&self) -> &[String] {
        &self.options.unique
    }

    /// Fields carrying a lookup index.
    #[inline]
    pub fn indexed_field_names(&self) -> &[String] {
        &self.options.indices
    }

    /// Number of live records.
    #[inline]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the collection holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over live records in storage ID (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.records.values()
    }

    /// Returns a copy of every live record in storage ID order.
    pub fn documents(&self) -> Vec<Document> {
        self.records.values().cloned().collect()
    }

    /// Looks up a record by storage ID.
    pub fn get(&self, id: StorageId) -> Option<&Document> {
        self.records.get(&id)
    }

    /// Looks up the record holding `value` at a unique field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotUniqueField`] if `field` is not
    /// unique-constrained; no scan fallback is attempted.
    pub fn by(&self, field: &str, value: &Value) -> Result<Option<&Document>> {
        let index = self
            .unique
            .iter()
            .find(|index| index.field() == field)
            .ok_or_else(|| ValidationError::not_unique_field(&self.name, field))?;

        Ok(index.get(value).and_then(|id| self.records.get(&id)))
    }

    /// Adds `field` to the indexed fields if not already present.
    pub fn ensure_index(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.options.indices.contains(&field) {
            debug!(collection = %self.name, field = %field, "Index added");
            self.options.indices.push(field);
        }
    }

    /// Inserts a new record.
    ///
    /// Any `_id` or `meta` in `doc` is discarded; the returned document
    /// carries the assigned storage ID and fresh metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateValue`] if a unique field collides.
    pub fn insert(&mut self, mut doc: Document) -> Result<Document> {
        remove_storage_fields(&mut doc);

        if let Some((field, value)) = self.first_conflict(&doc, None) {
            return Err(ValidationError::duplicate_value(field, value).into());
        }

        let id = StorageId::from_raw(self.last_id).next();
        self.last_id = id.get();
        doc.insert(ID_FIELD.to_string(), id.into());
        doc.insert(META_FIELD.to_string(), RecordMeta::new().to_value());

        self.index_insert(id, &doc);
        self.records.insert(id, doc.clone());

        trace!(collection = %self.name, id = %id, "Record inserted");
        Ok(doc)
    }

    /// Inserts several records, all or nothing.
    ///
    /// Unique fields are checked against existing records and within the
    /// batch before anything is written. Returned documents are in input
    /// order.
    pub fn insert_many(&mut self, docs: Vec<Document>) -> Result<Vec<Document>> {
        let mut staged = self.unique.clone();
        for doc in &docs {
            for index in &staged {
                if let Some(value) = index.conflict(doc, None) {
                    return Err(
                        ValidationError::duplicate_value(index.field(), value.clone()).into(),
                    );
                }
            }
            // Placeholder ID: only presence matters for intra-batch checks.
            for index in staged.iter_mut() {
                index.insert(StorageId::from_raw(0), doc);
            }
        }

        docs.into_iter().map(|doc| self.insert(doc)).collect()
    }

    /// Replaces a live record in place.
    ///
    /// `doc` must carry the `_id` of a live record. Its `meta` is ignored:
    /// the stored metadata is carried over with the revision bumped.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::RequiredField`] / [`ValidationError::InvalidField`]
    ///   if `_id` is missing or malformed
    /// - [`NotFoundError::Record`] if no live record has that ID
    /// - [`ValidationError::DuplicateValue`] if a unique field collides with
    ///   another record
    pub fn update(&mut self, mut doc: Document) -> Result<Document> {
        let id = require_storage_id(&doc)?;
        let existing = self
            .records
            .get(&id)
            .ok_or_else(|| NotFoundError::record(&self.name, id))?;

        if let Some((field, value)) = self.first_conflict(&doc, Some(id)) {
            return Err(ValidationError::duplicate_value(field, value).into());
        }

        let meta = RecordMeta::from_document(existing)
            .unwrap_or_default()
            .bumped();
        doc.insert(ID_FIELD.to_string(), id.into());
        doc.insert(META_FIELD.to_string(), meta.to_value());

        let previous = self.records.insert(id, doc.clone());
        if let Some(previous) = previous {
            self.index_remove(id, &previous);
        }
        self.index_insert(id, &doc);

        trace!(collection = %self.name, id = %id, revision = meta.revision, "Record updated");
        Ok(doc)
    }

    /// Removes a live record, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Record`] if no live record has that ID.
    pub fn remove(&mut self, id: StorageId) -> Result<Document> {
        let doc = self
            .records
            .remove(&id)
            .ok_or_else(|| NotFoundError::record(&self.name, id))?;
        self.index_remove(id, &doc);

        trace!(collection = %self.name, id = %id, "Record removed");
        Ok(doc)
    }

    /// Removes every record. Constraints and the ID high-water mark are kept.
    pub fn clear(&mut self) {
        self.records.clear();
        for index in self.unique.iter_mut() {
            index.clear();
        }
        debug!(collection = %self.name, "Collection cleared");
    }

    // =========================================================================
    // Index maintenance
    // =========================================================================

    fn first_conflict(&self, doc: &Document, exclude: Option<StorageId>) -> Option<(String, Value)> {
        self.unique.iter().find_map(|index| {
            index
                .conflict(doc, exclude)
                .map(|value| (index.field().to_string(), value.clone()))
        })
    }

    fn index_insert(&mut self, id: StorageId, doc: &Document) {
        for index in self.unique.iter_mut() {
            index.insert(id, doc);
        }
    }

    fn index_remove(&mut self, id: StorageId, doc: &Document) {
        for index in self.unique.iter_mut() {
            index.remove(id, doc);
        }
    }
}
