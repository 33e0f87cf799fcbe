use std::collections::{BTreeMap, BTreeSet, HashMap};
use serde::{Serialize, Deserialize};
use serde_json::{json, Map, Value as JsonValue};
use crate::fields::strategy::json_type_of;
use crate::schema::field_info::JsonType;

/// Inferred shape of a JSON node, merged across every document seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    pub types: BTreeSet<JsonType>,
    pub properties: BTreeMap<String, JsonSchema>,
    pub items: Option<Box<JsonSchema>>,
}

impl JsonSchema {
    pub fn infer(value: &JsonValue) -> Self {
        let mut schema = JsonSchema::default();
        schema.types.insert(json_type_of(value));

        match value {
            JsonValue::Object(map) => {
                for (key, child) in map {
                    schema.properties.insert(key.clone(), JsonSchema::infer(child));
                }
            }
            JsonValue::Array(elements) => {
                let mut items: Option<JsonSchema> = None;
                for element in elements {
                    let inferred = JsonSchema::infer(element);
                    match items.as_mut() {
                        Some(existing) => {
                            existing.merge(&inferred);
                        }
                        None => items = Some(inferred),
                    }
                }
                schema.items = items.map(Box::new);
            }
            _ => {}
        }
        schema
    }

    /// Union of both shapes. Drift is recorded, never rejected.
    pub fn merge(&mut self, other: &JsonSchema) -> bool {
        let mut changed = false;
        for t in &other.types {
            changed |= self.types.insert(*t);
        }
        for (key, child) in &other.properties {
            match self.properties.get_mut(key) {
                Some(existing) => changed |= existing.merge(child),
                None => {
                    self.properties.insert(key.clone(), child.clone());
                    changed = true;
                }
            }
        }
        if let Some(other_items) = &other.items {
            match self.items.as_mut() {
                Some(items) => changed |= items.merge(other_items),
                None => {
                    self.items = Some(other_items.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// JSON-schema flavoured rendering.
    pub fn to_json(&self) -> JsonValue {
        let names: Vec<&'static str> = self.types.iter().map(|t| type_name(*t)).collect();
        let mut out = Map::new();
        out.insert("type".to_string(), if names.len() == 1 { json!(names[0]) } else { json!(names) });
        if self.types.contains(&JsonType::Date) {
            out.insert("format".to_string(), json!("date-time"));
        }
        if !self.properties.is_empty() {
            let properties: Map<String, JsonValue> = self.properties.iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            out.insert("properties".to_string(), JsonValue::Object(properties));
        }
        if let Some(items) = &self.items {
            out.insert("items".to_string(), items.to_json());
        }
        JsonValue::Object(out)
    }
}

fn type_name(json_type: JsonType) -> &'static str {
    match json_type {
        JsonType::Object => "object",
        JsonType::Array => "array",
        JsonType::String | JsonType::Date | JsonType::TimeSpan => "string",
        JsonType::Integer => "integer",
        JsonType::Float => "number",
        JsonType::Boolean => "boolean",
        JsonType::Null | JsonType::Undefined => "null",
    }
}

/// Merged schema per content type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaIndex {
    schemas: HashMap<String, JsonSchema>,
}

impl SchemaIndex {
    pub fn new() -> Self {
        SchemaIndex { schemas: HashMap::new() }
    }

    pub fn merge(&mut self, content_type: &str, schema: &JsonSchema) -> bool {
        let changed = self.schemas.entry(content_type.to_string()).or_default().merge(schema);
        if changed {
            tracing::debug!(content_type, "schema extended");
        }
        changed
    }

    pub fn get(&self, content_type: &str) -> Option<&JsonSchema> {
        self.schemas.get(content_type)
    }

    pub fn content_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_nested_shapes() {
        let schema = JsonSchema::infer(&json!({
            "name": "Peter",
            "tags": ["a", 1],
            "address": { "city": "Aarhus" },
        }));
        assert_eq!(schema.to_json(), json!({
            "type": "object",
            "properties": {
                "address": { "type": "object", "properties": { "city": { "type": "string" } } },
                "name": { "type": "string" },
                "tags": { "type": "array", "items": { "type": ["string", "integer"] } },
            }
        }));
    }

    #[test]
    fn merging_unions_drifting_types() {
        let mut index = SchemaIndex::new();
        assert!(index.merge("person", &JsonSchema::infer(&json!({ "age": 20 }))));
        assert!(index.merge("person", &JsonSchema::infer(&json!({ "age": "twenty", "created": "2014-09-10T11:00:00Z" }))));
        assert!(!index.merge("person", &JsonSchema::infer(&json!({ "age": 30 }))));

        let person = index.get("person").unwrap();
        assert_eq!(person.properties["age"].types, BTreeSet::from([JsonType::String, JsonType::Integer]));
        assert_eq!(person.properties["created"].to_json(), json!({ "type": "string", "format": "date-time" }));
    }
}
