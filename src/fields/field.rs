use crate::core::types::{Field, FieldValue};
use crate::schema::field_info::{FieldInfo, JsonType};

/// Native fields projected from one JSON node, all sharing its source path.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexableJsonField {
    pub path: String,
    pub json_type: JsonType,
    pub strategy: String,
    pub fields: Vec<Field>,
}

impl IndexableJsonField {
    pub fn new(path: impl Into<String>, json_type: JsonType, strategy: impl Into<String>) -> Self {
        IndexableJsonField {
            path: path.into(),
            json_type,
            strategy: strategy.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_infos(&self) -> impl Iterator<Item = FieldInfo> + '_ {
        self.fields.iter().map(move |field| FieldInfo {
            path: self.path.clone(),
            json_type: self.json_type,
            field_name: field.name.clone(),
            field_type: field.field_type(),
            strategy: self.strategy.clone(),
            analyzer: match &field.value {
                FieldValue::Text { analyzer, .. } => Some(analyzer.clone()),
                _ => None,
            },
        })
    }
}

/// Name of a sub-field such as `created.@ticks`.
pub fn sub_field(path: &str, suffix: &str) -> String {
    format!("{}.@{}", path, suffix)
}
