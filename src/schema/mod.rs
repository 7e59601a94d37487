//! Schema validators for records and whole collections.
//!
//! StrictDB treats a schema as an opaque validator: it receives a JSON value
//! and either returns the (possibly coerced or defaulted) value or a
//! [`SchemaViolation`]. Two schemas are attached to every initialized
//! collection:
//!
//! - a **record schema**, checked on every validated mutation
//! - a **collection schema**, checked once over the whole data set when a
//!   collection is rebuilt
//!
//! Both default to [`AnySchema`]. Closures implement [`Schema`] too, so an
//! application can plug in its own validation library.
//!
//! ```rust
//! use strictdb::schema::{FieldType, ObjectSchema, RecordListSchema, Schema};
//! use serde_json::json;
//!
//! let post = ObjectSchema::new()
//!     .required("slug", FieldType::String)
//!     .optional("content", FieldType::String)
//!     .with_default("draft", json!(true));
//!
//! let value = post.validate(json!({"slug": "hello"})).unwrap();
//! assert_eq!(value, json!({"slug": "hello", "draft": true}));
//!
//! let posts = RecordListSchema::new(post).unique_by("slug");
//! assert!(posts.validate(json!([{"slug": "a"}, {"slug": "a"}])).is_err());
//! ```

mod list;
mod object;

pub use list::RecordListSchema;
pub use object::{FieldRule, FieldType, ObjectSchema};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Describes why a value failed a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Location of the offending value (`""` for the root, `"slug"`,
    /// `"[3].slug"` for collection schemas).
    pub path: String,

    /// Human-readable reason.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a violation at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Prefixes the path, used when a nested schema reports a failure.
    pub fn within(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else if self.path.starts_with('[') {
            format!("{}{}", prefix, self.path)
        } else {
            format!("{}.{}", prefix, self.path)
        };
        self
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "'{}' {}", self.path, self.message)
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// An opaque value validator.
///
/// Implementations take ownership of the input so they can return it
/// unchanged, coerced, or with defaults filled in.
pub trait Schema: Send + Sync {
    /// Validates `value`, returning the validated value.
    fn validate(&self, value: Value) -> Result<Value, SchemaViolation>;
}

impl<F> Schema for F
where
    F: Fn(Value) -> Result<Value, SchemaViolation> + Send + Sync,
{
    fn validate(&self, value: Value) -> Result<Value, SchemaViolation> {
        self(value)
    }
}

/// Accepts every value unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnySchema;

impl Schema for AnySchema {
    fn validate(&self, value: Value) -> Result<Value, SchemaViolation> {
        Ok(value)
    }
}

/// Shared, type-erased schema handle.
pub type SharedSchema = Arc<dyn Schema>;

/// Returns a shared [`AnySchema`].
pub fn any() -> SharedSchema {
    Arc::new(AnySchema)
}
