use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::fields::strategies::{
    ArrayStrategy, BooleanStrategy, DoubleStrategy, ExpandedDateTimeStrategy, ExpandedTimeSpanStrategy,
    IdentityStrategy, Int64Strategy, NullStrategy, TextStrategy, UndefinedStrategy,
};
use crate::fields::strategy::FieldStrategy;
use crate::schema::field_info::JsonType;

/// Strategy lookup per `(content type, path)`, falling back to a strategy
/// inferred from the JSON type of the value.
pub struct FieldConfiguration {
    configured: RwLock<HashMap<(String, String), Arc<dyn FieldStrategy>>>,
    identity_paths: Vec<String>,
    identity: Arc<dyn FieldStrategy>,
    text: Arc<dyn FieldStrategy>,
    array: Arc<dyn FieldStrategy>,
    int64: Arc<dyn FieldStrategy>,
    double: Arc<dyn FieldStrategy>,
    boolean: Arc<dyn FieldStrategy>,
    null: Arc<dyn FieldStrategy>,
    undefined: Arc<dyn FieldStrategy>,
    date: Arc<dyn FieldStrategy>,
    timespan: Arc<dyn FieldStrategy>,
}

impl FieldConfiguration {
    /// `identity_paths` are always indexed as exact terms (`$id`, `$contentType`).
    pub fn new(identity_paths: Vec<String>) -> Self {
        FieldConfiguration {
            configured: RwLock::new(HashMap::new()),
            identity_paths,
            identity: Arc::new(IdentityStrategy),
            text: Arc::new(TextStrategy::default()),
            array: Arc::new(ArrayStrategy),
            int64: Arc::new(Int64Strategy),
            double: Arc::new(DoubleStrategy),
            boolean: Arc::new(BooleanStrategy),
            null: Arc::new(NullStrategy),
            undefined: Arc::new(UndefinedStrategy),
            date: Arc::new(ExpandedDateTimeStrategy),
            timespan: Arc::new(ExpandedTimeSpanStrategy),
        }
    }

    pub fn set(&self, content_type: &str, path: &str, strategy: Arc<dyn FieldStrategy>) {
        self.configured.write().insert((content_type.to_string(), path.to_string()), strategy);
    }

    /// `None` for objects, whose properties are resolved one by one.
    pub fn resolve(&self, content_type: &str, path: &str, json_type: JsonType) -> Option<Arc<dyn FieldStrategy>> {
        if self.identity_paths.iter().any(|p| p == path) {
            return Some(self.identity.clone());
        }
        // Arrays always count their elements; a configured strategy applies to the elements
        if json_type != JsonType::Array {
            let key = (content_type.to_string(), path.to_string());
            if let Some(strategy) = self.configured.read().get(&key) {
                return Some(strategy.clone());
            }
        }
        self.default_for(json_type)
    }

    pub fn default_for(&self, json_type: JsonType) -> Option<Arc<dyn FieldStrategy>> {
        let strategy = match json_type {
            JsonType::Object => return None,
            JsonType::Array => &self.array,
            JsonType::String => &self.text,
            JsonType::Integer => &self.int64,
            JsonType::Float => &self.double,
            JsonType::Boolean => &self.boolean,
            JsonType::Null => &self.null,
            JsonType::Undefined => &self.undefined,
            JsonType::Date => &self.date,
            JsonType::TimeSpan => &self.timespan,
        };
        Some(strategy.clone())
    }
}

impl Default for FieldConfiguration {
    fn default() -> Self {
        FieldConfiguration::new(vec!["$id".to_string(), "$contentType".to_string()])
    }
}
