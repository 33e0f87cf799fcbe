use serde_json::Value as JsonValue;
use crate::core::error::Result;
use crate::fields::field::IndexableJsonField;
use crate::fields::strategies::parse_json_date;
use crate::schema::field_info::JsonType;

/// Where a value sits in the document being projected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    pub content_type: String,
    pub path: String,
}

impl PathContext {
    pub fn new(content_type: impl Into<String>, path: impl Into<String>) -> Self {
        PathContext { content_type: content_type.into(), path: path.into() }
    }

    /// Object properties extend the path; array elements keep it.
    pub fn child(&self, property: &str) -> PathContext {
        let path = if self.path.is_empty() {
            property.to_string()
        } else {
            format!("{}.{}", self.path, property)
        };
        PathContext { content_type: self.content_type.clone(), path }
    }
}

/// Projects a JSON value at a path into native index fields.
/// Implementations must be pure: same value and path, same fields.
pub trait FieldStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>>;
}

pub fn json_type_of(value: &JsonValue) -> JsonType {
    match value {
        JsonValue::Null => JsonType::Null,
        JsonValue::Bool(_) => JsonType::Boolean,
        JsonValue::Number(n) if n.is_i64() => JsonType::Integer,
        JsonValue::Number(_) => JsonType::Float,
        JsonValue::String(s) if parse_json_date(s).is_some() => JsonType::Date,
        JsonValue::String(_) => JsonType::String,
        JsonValue::Array(_) => JsonType::Array,
        JsonValue::Object(_) => JsonType::Object,
    }
}
