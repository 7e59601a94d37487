//! Collection-level schema: a whole data set validated at once.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{AnySchema, Schema, SchemaViolation, SharedSchema};
use crate::record::unique_key;

/// Validates a JSON array of records.
///
/// Each item is run through the item schema (its defaults are kept), and,
/// when [`unique_by`](Self::unique_by) is set, no two items may share a
/// non-null value at the nominated field. This is the schema checked before
/// a collection is rebuilt.
#[derive(Clone)]
pub struct RecordListSchema {
    items: SharedSchema,
    unique_by: Option<String>,
}

impl RecordListSchema {
    /// Creates a list schema validating every item with `items`.
    pub fn new<S: Schema + 'static>(items: S) -> Self {
        Self::shared(Arc::new(items))
    }

    /// Creates a list schema from an already shared item schema.
    pub fn shared(items: SharedSchema) -> Self {
        Self {
            items,
            unique_by: None,
        }
    }

    /// Creates a list schema that accepts any items.
    pub fn any_items() -> Self {
        Self::new(AnySchema)
    }

    /// Requires distinct non-null values at `field` across all items.
    pub fn unique_by(mut self, field: impl Into<String>) -> Self {
        self.unique_by = Some(field.into());
        self
    }
}

impl std::fmt::Debug for RecordListSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordListSchema")
            .field("unique_by", &self.unique_by)
            .finish_non_exhaustive()
    }
}

impl Schema for RecordListSchema {
    fn validate(&self, value: Value) -> Result<Value, SchemaViolation> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(SchemaViolation::new(
                    "",
                    format!("must be an array, got {}", other),
                ))
            }
        };

        let mut validated = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let item = self
                .items
                .validate(item)
                .map_err(|e| e.within(&format!("[{}]", i)))?;
            validated.push(item);
        }

        if let Some(field) = &self.unique_by {
            // Same key as the collection's unique index
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (i, item) in validated.iter().enumerate() {
                let Some(value) = item.get(field).filter(|v| !v.is_null()) else {
                    continue;
                };
                if let Some(first) = seen.insert(unique_key(value), i) {
                    return Err(SchemaViolation::new(
                        format!("[{}].{}", i, field),
                        format!("duplicates the value {} already used at [{}]", value, first),
                    ));
                }
            }
        }

        Ok(Value::Array(validated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, ObjectSchema};
    use serde_json::json;

    fn people() -> RecordListSchema {
        RecordListSchema::new(
            ObjectSchema::new()
                .required("name", FieldType::String)
                .optional("content", FieldType::String),
        )
        .unique_by("name")
    }

    #[test]
    fn test_accepts_distinct_records() {
        let value = json!([
            {"name": "john", "content": "smith"},
            {"name": "julius", "content": "caesar"}
        ]);
        assert_eq!(people().validate(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = people()
            .validate(json!([
                {"name": "john", "content": "smith"},
                {"name": "john", "content": "travolta"}
            ]))
            .unwrap_err();
        assert_eq!(err.path, "[1].name");
        assert!(err.message.contains("[0]"));
    }

    #[test]
    fn test_reordered_objects_are_duplicates() {
        let schema = RecordListSchema::any_items().unique_by("k");
        let err = schema
            .validate(json!([{"k": {"a": 1, "b": 2}}, {"k": {"b": 2, "a": 1}}]))
            .unwrap_err();
        assert_eq!(err.path, "[1].k");
    }

    #[test]
    fn test_nulls_do_not_collide() {
        let schema = RecordListSchema::any_items().unique_by("slug");
        assert!(schema
            .validate(json!([{"slug": null}, {"slug": null}, {}]))
            .is_ok());
    }

    #[test]
    fn test_item_failure_reports_index() {
        let err = people()
            .validate(json!([{"name": "a"}, {"content": "no name"}]))
            .unwrap_err();
        assert_eq!(err.path, "[1].name");
        assert_eq!(err.message, "is required");
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(people().validate(json!({"name": "a"})).is_err());
    }

    #[test]
    fn test_item_defaults_are_kept() {
        let schema = RecordListSchema::new(ObjectSchema::new().with_default("tags", json!([])));
        let value = schema.validate(json!([{}])).unwrap();
        assert_eq!(value, json!([{"tags": []}]));
    }
}
