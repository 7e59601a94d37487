//! Schema- and uniqueness-checked access to a collection.
//!
//! A [`ValidatedCollection`] borrows a live [`Collection`] together with
//! the record schema it was initialized with. It is produced by
//! [`CollectionInitializer::initialize`](crate::CollectionInitializer::initialize)
//! and is cheap to recreate, so nothing about it needs to survive a reload.
//!
//! # Storage fields
//!
//! `_id` and `meta` belong to the engine. They are stripped before a record
//! reaches the schema, and replace/patch always carry over the stored
//! values, whatever the caller supplied.
//!
//! # Operation summary
//!
//! | Operation | Schema | Unique fields | Missing `_id` target |
//! |-----------|--------|---------------|----------------------|
//! | [`upsert`](ValidatedCollection::upsert) | no | engine only | inserted as new |
//! | [`validate_and_insert`](ValidatedCollection::validate_and_insert) | yes | yes | - |
//! | [`validate_and_replace`](ValidatedCollection::validate_and_replace) | yes | yes | not found |
//! | [`validate_and_patch`](ValidatedCollection::validate_and_patch) | merged result | patch only | not found |

use serde_json::Value;
use tracing::{debug, instrument};

use crate::collection::Collection;
use crate::error::{NotFoundError, Result, ValidationError};
use crate::record::{
    copy_storage_fields, is_storage_field, require_storage_id, storage_id_of,
    strip_storage_fields, Document,
};
use crate::schema::{SchemaViolation, SharedSchema};
use crate::types::StorageId;

/// A collection paired with its record schema.
pub struct ValidatedCollection<'a> {
    collection: &'a mut Collection,
    record_schema: SharedSchema,
}

impl std::fmt::Debug for ValidatedCollection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedCollection")
            .field("name", &self.collection.name())
            .field("count", &self.collection.count())
            .finish_non_exhaustive()
    }
}

impl<'a> ValidatedCollection<'a> {
    /// Wraps `collection`, validating records with `record_schema`.
    pub fn new(collection: &'a mut Collection, record_schema: SharedSchema) -> Self {
        Self {
            collection,
            record_schema,
        }
    }

    /// Collection name.
    #[inline]
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// Number of live records.
    #[inline]
    pub fn count(&self) -> usize {
        self.collection.count()
    }

    /// Copies of every live record in storage ID order.
    pub fn documents(&self) -> Vec<Document> {
        self.collection.documents()
    }

    /// The underlying collection.
    pub fn collection(&self) -> &Collection {
        self.collection
    }

    /// The underlying collection, for unchecked writes.
    pub fn raw_mut(&mut self) -> &mut Collection {
        self.collection
    }

    // =========================================================================
    // Lookup and removal
    // =========================================================================

    /// Fetches a record by storage ID.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidField`] if `id` is not a positive integer
    /// - [`NotFoundError::Record`] if no live record has that ID
    pub fn get_by_id(&self, id: impl Into<Value>) -> Result<Document> {
        let id = StorageId::from_value(&id.into())?;
        self.get_live(id).cloned()
    }

    fn get_live(&self, id: StorageId) -> Result<&Document> {
        self.collection
            .get(id)
            .ok_or_else(|| NotFoundError::record(self.collection.name(), id).into())
    }

    /// Removes the record holding `value` at the unique field `field`.
    ///
    /// Returns `Ok(None)` when no record matches.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotUniqueField`] if `field` is not
    /// unique-constrained.
    #[instrument(level = "debug", skip(self, value), fields(collection = %self.collection.name()))]
    pub fn remove_by_field(&mut self, field: &str, value: &Value) -> Result<Option<Document>> {
        let id = match self.collection.by(field, value)? {
            Some(doc) => require_storage_id(doc)?,
            None => {
                debug!("No record to remove");
                return Ok(None);
            }
        };
        self.collection.remove(id).map(Some)
    }

    /// Removes a record by storage ID, returning the removed copy.
    ///
    /// # Errors
    ///
    /// Same as [`get_by_id`](Self::get_by_id).
    #[instrument(level = "debug", skip(self, id), fields(collection = %self.collection.name()))]
    pub fn remove_by_id(&mut self, id: impl Into<Value>) -> Result<Document> {
        let id = StorageId::from_value(&id.into())?;
        self.get_live(id)?;
        self.collection.remove(id)
    }

    // =========================================================================
    // Unchecked write
    // =========================================================================

    /// Updates the record if its `_id` is live, inserts it otherwise.
    ///
    /// Neither path runs the record schema; the engine still enforces
    /// unique fields. An `_id` that does not resolve (absent, stale, or
    /// malformed) is discarded and a fresh one assigned, along with fresh
    /// `meta`.
    #[instrument(level = "debug", skip(self, doc), fields(collection = %self.collection.name()))]
    pub fn upsert(&mut self, doc: Document) -> Result<Document> {
        if let Ok(Some(id)) = storage_id_of(&doc) {
            if self.collection.get(id).is_some() {
                return self.collection.update(doc);
            }
            debug!(id = %id, "Storage ID does not resolve, inserting as new");
        }
        self.collection.insert(doc)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Runs `doc` through the record schema.
    ///
    /// Storage fields are withheld from the schema and put back on the
    /// returned value, so schemas never see `_id` or `meta`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Schema`] with the schema's failure detail.
    pub fn validate_object_schema(&self, doc: &Document) -> Result<Document> {
        let value = Value::Object(strip_storage_fields(doc));
        match self.record_schema.validate(value)? {
            Value::Object(mut validated) => {
                validated.retain(|k, _| !is_storage_field(k));
                copy_storage_fields(&mut validated, doc);
                Ok(validated)
            }
            _ => Err(SchemaViolation::new("", "record schema must produce an object").into()),
        }
    }

    /// Checks `doc`'s unique fields against the other live records.
    ///
    /// A field is checked only when `doc` supplies a non-null value for it
    /// that differs from `existing`'s. Passing the record being updated as
    /// `existing` keeps an unchanged value from colliding with itself.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateValue`] naming the first
    /// offending field and value.
    pub fn validate_unique_fields(&self, doc: &Document, existing: Option<&Document>) -> Result<()> {
        for field in self.collection.unique_field_names() {
            let value = match doc.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            if existing.and_then(|e| e.get(field)) == Some(value) {
                continue;
            }
            if self.collection.by(field, value)?.is_some() {
                return Err(ValidationError::duplicate_value(field, value.clone()).into());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Validated writes
    // =========================================================================

    /// Validates `doc` and inserts it as a new record.
    ///
    /// The schema runs before the uniqueness check. Any `_id`/`meta` in
    /// `doc` is ignored.
    #[instrument(level = "debug", skip(self, doc), fields(collection = %self.collection.name()))]
    pub fn validate_and_insert(&mut self, doc: Document) -> Result<Document> {
        let validated = self.validate_object_schema(&doc)?;
        self.validate_unique_fields(&validated, None)?;
        self.collection.insert(validated)
    }

    /// Replaces the record named by `doc`'s `_id` with `doc`.
    ///
    /// Fields not re-supplied are dropped; `_id` and `meta` come from the
    /// stored record.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::RequiredField`] if `doc` has no `_id`
    /// - [`NotFoundError::Record`] if `_id` does not resolve
    /// - [`ValidationError::Schema`] / [`ValidationError::DuplicateValue`]
    #[instrument(level = "debug", skip(self, doc), fields(collection = %self.collection.name()))]
    pub fn validate_and_replace(&mut self, doc: Document) -> Result<Document> {
        let id = require_storage_id(&doc)?;
        let existing = self.get_live(id)?.clone();

        let mut validated = self.validate_object_schema(&doc)?;
        self.validate_unique_fields(&validated, Some(&existing))?;
        copy_storage_fields(&mut validated, &existing);

        self.collection.update(validated)
    }

    /// Merges `doc` over the record named by its `_id`.
    ///
    /// Supplied fields win, omitted fields keep their stored values, and
    /// `_id`/`meta` always come from the stored record. Uniqueness is
    /// checked on the patch itself, before merging; the schema is checked
    /// on the merged result, so a patch that nulls a required field fails.
    ///
    /// # Errors
    ///
    /// Same as [`validate_and_replace`](Self::validate_and_replace).
    #[instrument(level = "debug", skip(self, doc), fields(collection = %self.collection.name()))]
    pub fn validate_and_patch(&mut self, doc: Document) -> Result<Document> {
        let id = require_storage_id(&doc)?;
        let existing = self.get_live(id)?.clone();

        self.validate_unique_fields(&doc, Some(&existing))?;

        let mut merged = existing.clone();
        for (field, value) in doc {
            if !is_storage_field(&field) {
                merged.insert(field, value);
            }
        }
        copy_storage_fields(&mut merged, &existing);

        let validated = self.validate_object_schema(&merged)?;
        self.collection.update(validated)
    }
}
