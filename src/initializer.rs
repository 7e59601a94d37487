//! Collection initialization and constraint migration.
//!
//! A [`CollectionInitializer`] describes what a collection must look like:
//! its name, the fields that must be unique, a collection schema checked
//! over the whole data set on rebuild, and a record schema checked on every
//! validated write. [`initialize`](CollectionInitializer::initialize)
//! reconciles that requirement with whatever the database currently holds.
//!
//! # States
//!
//! ```text
//!   absent ─────────────► create ─────────────┐
//!                                             ▼
//!   present, violating ─► rebuild ──► present, satisfying ──► ValidatedCollection
//!                                             ▲
//!   present, satisfying ──────────────────────┘
//! ```
//!
//! A collection violates the requirement when some required unique field is
//! not enforced. Rebuilding validates the stripped records against the
//! collection schema and the new unique fields before the old collection is
//! touched; if anything fails the database is left as it was.
//!
//! # Example
//!
//! ```rust
//! use strictdb::{CollectionInitializer, Config, StrictDB};
//! use strictdb::schema::{FieldType, ObjectSchema, RecordListSchema};
//! use serde_json::json;
//!
//! # fn main() -> strictdb::Result<()> {
//! let post = ObjectSchema::new()
//!     .required("slug", FieldType::String)
//!     .optional("content", FieldType::String);
//!
//! let posts = CollectionInitializer::new("posts", "slug")?
//!     .record_schema(post.clone())
//!     .collection_schema(RecordListSchema::new(post).unique_by("slug"));
//!
//! let mut db = StrictDB::open_in_memory(Config::default())?;
//! let mut collection = posts.initialize(&mut db)?;
//! let record = collection.validate_and_insert(
//!     json!({"slug": "hello"}).as_object().cloned().unwrap_or_default(),
//! )?;
//! assert_eq!(record["_id"], json!(1));
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::collection::{Collection, CollectionOptions};
use crate::db::StrictDB;
use crate::error::{NotFoundError, Result, StrictDBError};
use crate::introspect::has_unique_field_names;
use crate::record::{strip_storage_fields, Document};
use crate::schema::{self, Schema, SchemaViolation, SharedSchema};
use crate::validated::ValidatedCollection;

/// Callback run around create and rebuild.
///
/// Receives the database and the collection name. An error aborts the
/// surrounding operation and is returned to the caller.
pub type LifecycleHook = Box<dyn Fn(&mut StrictDB, &str) -> Result<()> + Send + Sync>;

/// Requirement for one named collection.
pub struct CollectionInitializer {
    name: String,
    unique: Vec<String>,
    indices: Vec<String>,
    collection_schema: SharedSchema,
    record_schema: SharedSchema,
    pre_create: Option<LifecycleHook>,
    post_create: Option<LifecycleHook>,
    pre_rebuild: Option<LifecycleHook>,
    post_rebuild: Option<LifecycleHook>,
}

impl std::fmt::Debug for CollectionInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionInitializer")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

impl CollectionInitializer {
    /// Creates an initializer for `name` requiring `unique_field_names`.
    ///
    /// `unique_field_names` is a single string or an array of distinct
    /// strings. Both schemas default to accepting anything and every hook
    /// to a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StrictDBError::Config`] for any other shape: numbers,
    /// booleans, null, objects, non-string or empty entries, duplicates.
    /// Nothing touches a database before this check.
    ///
    /// ```rust
    /// use strictdb::CollectionInitializer;
    /// use serde_json::json;
    ///
    /// assert!(CollectionInitializer::new("posts", "slug").is_ok());
    /// assert!(CollectionInitializer::new("posts", json!(["slug", "title"])).is_ok());
    /// assert!(CollectionInitializer::new("posts", 7).unwrap_err().is_config());
    /// assert!(CollectionInitializer::new("posts", json!(["a", "a"])).unwrap_err().is_config());
    /// ```
    pub fn new(name: impl Into<String>, unique_field_names: impl Into<Value>) -> Result<Self> {
        let name = name.into();
        let unique = parse_unique_field_names(unique_field_names.into())?;

        debug!(collection = %name, unique = ?unique, "Initializer configured");

        Ok(Self {
            name,
            unique,
            indices: Vec::new(),
            collection_schema: schema::any(),
            record_schema: schema::any(),
            pre_create: None,
            post_create: None,
            pre_rebuild: None,
            post_rebuild: None,
        })
    }

    /// Sets the schema the whole data set must pass on rebuild.
    ///
    /// It receives a JSON array of records with storage fields stripped and
    /// must return an array of objects.
    pub fn collection_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.collection_schema = Arc::new(schema);
        self
    }

    /// Sets the schema each record must pass on validated writes.
    pub fn record_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.record_schema = Arc::new(schema);
        self
    }

    /// Declares fields that should carry a lookup index.
    pub fn indexed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Runs `hook` before a fresh collection is created.
    pub fn on_pre_create(
        mut self,
        hook: impl Fn(&mut StrictDB, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.pre_create = Some(Box::new(hook));
        self
    }

    /// Runs `hook` after a fresh collection is created.
    pub fn on_post_create(
        mut self,
        hook: impl Fn(&mut StrictDB, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.post_create = Some(Box::new(hook));
        self
    }

    /// Runs `hook` when a rebuild starts, before anything is validated.
    pub fn on_pre_rebuild(
        mut self,
        hook: impl Fn(&mut StrictDB, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.pre_rebuild = Some(Box::new(hook));
        self
    }

    /// Runs `hook` once a rebuilt collection is populated.
    pub fn on_post_rebuild(
        mut self,
        hook: impl Fn(&mut StrictDB, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.post_rebuild = Some(Box::new(hook));
        self
    }

    /// Collection name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields that must be unique, in the order given.
    #[inline]
    pub fn unique_field_names(&self) -> &[String] {
        &self.unique
    }

    /// Fields declared as indexed.
    #[inline]
    pub fn indexed_field_names(&self) -> &[String] {
        &self.indices
    }

    /// The record schema shared with every [`ValidatedCollection`] this
    /// initializer returns.
    pub fn shared_record_schema(&self) -> SharedSchema {
        Arc::clone(&self.record_schema)
    }

    fn options(&self) -> CollectionOptions {
        CollectionOptions::new()
            .unique(self.unique.iter().cloned())
            .indices(self.indices.iter().cloned())
    }

    fn run_hook(&self, hook: &Option<LifecycleHook>, db: &mut StrictDB) -> Result<()> {
        match hook {
            Some(hook) => hook(db, &self.name),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Protocol
    // =========================================================================

    /// Returns true if the collection is absent or does not enforce every
    /// required unique field.
    ///
    /// This is a subset test: a collection enforcing extra unique fields
    /// beyond the requirement is kept as is, so its enforced set can be a
    /// strict superset of what was last requested. Only a create or rebuild
    /// resets it to exactly the required fields.
    pub fn should_rebuild(&self, db: &StrictDB) -> bool {
        match db.get_collection(&self.name) {
            None => true,
            Some(collection) => !has_unique_field_names(collection, self.unique.as_slice()),
        }
    }

    /// Creates the collection empty, with exactly the required unique
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CollectionExists`](crate::StorageError::CollectionExists)
    /// if the name is already taken, or whatever a hook returns.
    #[instrument(skip(self, db), fields(collection = %self.name))]
    pub fn create(&self, db: &mut StrictDB) -> Result<()> {
        self.run_hook(&self.pre_create, db)?;
        db.add_collection(&self.name, self.options())?;
        self.run_hook(&self.post_create, db)?;

        info!(unique = ?self.unique, "Collection created");
        Ok(())
    }

    /// Recreates the collection under the required constraints, replaying
    /// its records.
    ///
    /// An absent collection is simply created. Otherwise the records, with
    /// `_id` and `meta` stripped, must pass the collection schema and the
    /// required unique fields; only then is the old collection detached and
    /// the validated records inserted again in their original order with
    /// fresh storage IDs.
    ///
    /// # Errors
    ///
    /// A validation error leaves the existing collection untouched. An
    /// error from `create`, the replay, or the `post_rebuild` hook puts the
    /// detached collection back as it was.
    #[instrument(skip(self, db), fields(collection = %self.name))]
    pub fn rebuild(&self, db: &mut StrictDB) -> Result<()> {
        self.run_hook(&self.pre_rebuild, db)?;

        let records = match db.get_collection(&self.name) {
            Some(existing) => self.validate_existing(existing).map_err(|e| {
                warn!(error = %e, "Rebuild rejected, collection left unchanged");
                e
            })?,
            None => {
                self.create(db)?;
                return self.run_hook(&self.post_rebuild, db);
            }
        };

        let count = records.len();
        let previous = db
            .take_collection(&self.name)
            .ok_or_else(|| NotFoundError::collection(&self.name))?;

        match self.replay(db, records) {
            Ok(()) => {
                info!(records = count, unique = ?self.unique, "Collection rebuilt");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Rebuild aborted, original collection restored");
                db.put_collection(previous);
                Err(e)
            }
        }
    }

    /// Creates the replacement collection and fills it with `records`.
    fn replay(&self, db: &mut StrictDB, records: Vec<Document>) -> Result<()> {
        self.create(db)?;
        db.get_collection_mut(&self.name)
            .ok_or_else(|| NotFoundError::collection(&self.name))?
            .insert_many(records)?;
        self.run_hook(&self.post_rebuild, db)
    }

    /// Validates the records of `existing` for replay, without writing.
    fn validate_existing(&self, existing: &Collection) -> Result<Vec<Document>> {
        let items: Vec<Value> = existing
            .iter()
            .map(|doc| Value::Object(strip_storage_fields(doc)))
            .collect();

        let items = match self.collection_schema.validate(Value::Array(items))? {
            Value::Array(items) => items,
            _ => {
                return Err(
                    SchemaViolation::new("", "collection schema must produce an array").into(),
                )
            }
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(doc) => Ok(strip_storage_fields(&doc)),
                _ => Err(SchemaViolation::new(format!("[{}]", i), "must be an object")),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Dry run against the new constraints
        let mut staged = Collection::new(&self.name, self.options());
        staged.insert_many(records.clone())?;

        Ok(records)
    }

    /// Brings the collection in line with this requirement and returns it
    /// wrapped with the record schema.
    ///
    /// Rebuilds first if [`should_rebuild`](Self::should_rebuild). Declared
    /// indexed fields are added to a collection that is kept as is.
    #[instrument(skip(self, db), fields(collection = %self.name))]
    pub fn initialize<'db>(&self, db: &'db mut StrictDB) -> Result<ValidatedCollection<'db>> {
        if self.should_rebuild(db) {
            self.rebuild(db)?;
        } else {
            debug!("Collection already satisfies unique fields");
        }

        let collection = db
            .get_collection_mut(&self.name)
            .ok_or_else(|| NotFoundError::collection(&self.name))?;
        for field in &self.indices {
            collection.ensure_index(field.as_str());
        }

        Ok(ValidatedCollection::new(
            collection,
            self.shared_record_schema(),
        ))
    }
}

fn parse_unique_field_names(value: Value) -> Result<Vec<String>> {
    let names = match value {
        Value::String(name) => vec![name],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                other => Err(StrictDBError::config(format!(
                    "unique field names must be strings, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(StrictDBError::config(format!(
                "unique field names must be a string or an array of strings, got {}",
                other
            )))
        }
    };

    let mut seen = HashSet::new();
    for name in &names {
        if name.is_empty() {
            return Err(StrictDBError::config("unique field names must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(StrictDBError::config(format!(
                "duplicate unique field name '{}'",
                name
            )));
        }
    }

    Ok(names)
}
