//! Field-by-field validation of a single JSON object.

use serde_json::{Map, Value};

use super::{Schema, SchemaViolation};

/// Accepted JSON type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// Any value, including null.
    Any,
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A number with no fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A nested object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Object => "an object",
            Self::Array => "an array",
        }
    }
}

/// Constraint on a single field of an [`ObjectSchema`].
#[derive(Clone, Debug)]
pub struct FieldRule {
    /// Accepted type.
    pub field_type: FieldType,

    /// Whether the field must be present (after defaults are applied).
    pub required: bool,

    /// Whether an explicit `null` is accepted in place of a value.
    pub nullable: bool,

    /// Value inserted when the field is absent.
    pub default: Option<Value>,

    /// Minimum length for strings and arrays.
    pub min_len: Option<usize>,
}

/// Validates a JSON object against a set of [`FieldRule`]s.
///
/// Unknown fields are accepted unless [`ObjectSchema::deny_unknown`] is set.
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    fields: Vec<(String, FieldRule)>,
    deny_unknown: bool,
}

impl ObjectSchema {
    /// Creates an empty schema that accepts any object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required field.
    pub fn required(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(
            name,
            FieldRule {
                field_type,
                required: true,
                nullable: false,
                default: None,
                min_len: None,
            },
        )
    }

    /// Adds an optional field; `null` is accepted.
    pub fn optional(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(
            name,
            FieldRule {
                field_type,
                required: false,
                nullable: true,
                default: None,
                min_len: None,
            },
        )
    }

    /// Adds a field that is filled with `default` when absent.
    ///
    /// The field type is taken from the default value.
    pub fn with_default(self, name: impl Into<String>, default: Value) -> Self {
        let field_type = match &default {
            Value::String(_) => FieldType::String,
            Value::Number(_) => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Object(_) => FieldType::Object,
            Value::Array(_) => FieldType::Array,
            Value::Null => FieldType::Any,
        };
        self.field(
            name,
            FieldRule {
                field_type,
                required: true,
                nullable: false,
                default: Some(default),
                min_len: None,
            },
        )
    }

    /// Adds a field with a fully specified rule, replacing any earlier rule
    /// for the same name.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        let name = name.into();
        self.fields.retain(|(n, _)| *n != name);
        self.fields.push((name, rule));
        self
    }

    /// Sets a minimum length on an already declared string or array field.
    pub fn min_len(mut self, name: &str, min: usize) -> Self {
        if let Some((_, rule)) = self.fields.iter_mut().find(|(n, _)| n == name) {
            rule.min_len = Some(min);
        }
        self
    }

    /// Rejects fields that were not declared.
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    /// Returns the declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    fn check_field(
        &self,
        name: &str,
        rule: &FieldRule,
        object: &mut Map<String, Value>,
    ) -> Result<(), SchemaViolation> {
        if !object.contains_key(name) {
            if let Some(default) = &rule.default {
                object.insert(name.to_string(), default.clone());
            }
        }

        let value = match object.get(name) {
            Some(value) => value,
            None if rule.required => return Err(SchemaViolation::new(name, "is required")),
            None => return Ok(()),
        };

        if value.is_null() {
            if rule.nullable || rule.field_type == FieldType::Any {
                return Ok(());
            }
            return Err(SchemaViolation::new(name, "must not be null"));
        }

        if !rule.field_type.matches(value) {
            return Err(SchemaViolation::new(
                name,
                format!("must be {}, got {}", rule.field_type.name(), value),
            ));
        }

        if let Some(min) = rule.min_len {
            let len = match value {
                Value::String(s) => Some(s.chars().count()),
                Value::Array(a) => Some(a.len()),
                _ => None,
            };
            if let Some(len) = len {
                if len < min {
                    return Err(SchemaViolation::new(
                        name,
                        format!("must have length of at least {}, got {}", min, len),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, value: Value) -> Result<Value, SchemaViolation> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(SchemaViolation::new(
                    "",
                    format!("must be an object, got {}", other),
                ))
            }
        };

        for (name, rule) in &self.fields {
            self.check_field(name, rule, &mut object)?;
        }

        if self.deny_unknown {
            if let Some(unknown) = object
                .keys()
                .find(|k| !self.fields.iter().any(|(n, _)| n == *k))
            {
                return Err(SchemaViolation::new(unknown.as_str(), "is not allowed"));
            }
        }

        Ok(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_schema() -> ObjectSchema {
        ObjectSchema::new()
            .required("slug", FieldType::String)
            .optional("content", FieldType::String)
    }

    #[test]
    fn test_accepts_valid_object() {
        let value = json!({"slug": "a", "content": "123"});
        assert_eq!(post_schema().validate(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = post_schema().validate(json!([1])).unwrap_err();
        assert_eq!(err.path, "");
        assert!(err.message.contains("must be an object"));
    }

    #[test]
    fn test_missing_required_field() {
        let err = post_schema().validate(json!({"content": "x"})).unwrap_err();
        assert_eq!(err, SchemaViolation::new("slug", "is required"));
    }

    #[test]
    fn test_wrong_type() {
        let err = post_schema().validate(json!({"slug": 5})).unwrap_err();
        assert_eq!(err.path, "slug");
        assert!(err.message.contains("must be a string"));
    }

    #[test]
    fn test_optional_accepts_null_required_does_not() {
        assert!(post_schema()
            .validate(json!({"slug": "a", "content": null}))
            .is_ok());
        let err = post_schema().validate(json!({"slug": null})).unwrap_err();
        assert_eq!(err.message, "must not be null");
    }

    #[test]
    fn test_default_applied() {
        let schema = post_schema().with_default("draft", json!(false));
        let value = schema.validate(json!({"slug": "a"})).unwrap();
        assert_eq!(value["draft"], json!(false));

        // Supplied value wins over the default
        let value = schema.validate(json!({"slug": "a", "draft": true})).unwrap();
        assert_eq!(value["draft"], json!(true));
    }

    #[test]
    fn test_integer_type() {
        let schema = ObjectSchema::new().required("n", FieldType::Integer);
        assert!(schema.validate(json!({"n": 3})).is_ok());
        assert!(schema.validate(json!({"n": -3})).is_ok());
        assert!(schema.validate(json!({"n": 3.5})).is_err());
    }

    #[test]
    fn test_min_len() {
        let schema = post_schema().min_len("slug", 2);
        assert!(schema.validate(json!({"slug": "ab"})).is_ok());
        let err = schema.validate(json!({"slug": "a"})).unwrap_err();
        assert!(err.message.contains("at least 2"));
    }

    #[test]
    fn test_deny_unknown() {
        let schema = post_schema().deny_unknown();
        let err = schema
            .validate(json!({"slug": "a", "extra": 1}))
            .unwrap_err();
        assert_eq!(err, SchemaViolation::new("extra", "is not allowed"));
        assert!(post_schema().validate(json!({"slug": "a", "extra": 1})).is_ok());
    }

    #[test]
    fn test_field_redeclaration_replaces_rule() {
        let schema = post_schema().optional("slug", FieldType::Any);
        assert!(schema.validate(json!({})).is_ok());
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["content", "slug"]);
    }
}
