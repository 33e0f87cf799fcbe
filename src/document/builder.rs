use std::sync::Arc;
use serde_json::Value as JsonValue;
use uuid::Uuid;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::compression::compress::{pack, CompressionType};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{Document, Field, FieldValue};
use crate::document::context::BuildContext;
use crate::fields::configuration::FieldConfiguration;
use crate::fields::strategy::{json_type_of, PathContext};
use crate::schema::field_info::FieldInfoCollection;
use crate::schema::schema::JsonSchema;

/// Index-ready form of one JSON document.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub id: String,
    pub content_type: String,
    pub document: Document,
    pub field_infos: FieldInfoCollection,
    pub schema: JsonSchema,
}

/// Walks a JSON document and projects every node through its field strategy.
pub struct DocumentBuilder {
    configuration: Arc<FieldConfiguration>,
    analyzers: Arc<AnalyzerRegistry>,
    identity_field: String,
    content_type_field: String,
    default_content_type: String,
    source_field: String,
    source_compression: CompressionType,
}

impl DocumentBuilder {
    pub fn new(config: &Config, configuration: Arc<FieldConfiguration>) -> Self {
        DocumentBuilder {
            configuration,
            analyzers: Arc::new(AnalyzerRegistry::new()),
            identity_field: config.identity_field.clone(),
            content_type_field: config.content_type_field.clone(),
            default_content_type: config.default_content_type.clone(),
            source_field: config.source_field.clone(),
            source_compression: config.source_compression,
        }
    }

    /// Registry text fields are checked against; defaults to the built-ins.
    pub fn with_analyzers(mut self, analyzers: Arc<AnalyzerRegistry>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Fill in a generated `$id` and the default `$contentType` where missing.
    pub fn prepare(&self, mut json: JsonValue) -> Result<JsonValue> {
        let json_type = json_type_of(&json);
        let object = json.as_object_mut()
            .ok_or_else(|| Error::conversion(format!("expected a JSON object, got {:?}", json_type)))?;

        if object.get(&self.identity_field).is_none_or(JsonValue::is_null) {
            object.insert(self.identity_field.clone(), JsonValue::String(Uuid::new_v4().to_string()));
        }
        if object.get(&self.content_type_field).is_none_or(JsonValue::is_null) {
            object.insert(self.content_type_field.clone(), JsonValue::String(self.default_content_type.clone()));
        }
        Ok(json)
    }

    pub fn identity_of(&self, json: &JsonValue) -> Option<String> {
        match json.get(&self.identity_field)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn content_type_of(&self, json: &JsonValue) -> String {
        json.get(&self.content_type_field)
            .and_then(JsonValue::as_str)
            .unwrap_or(&self.default_content_type)
            .to_string()
    }

    pub fn build(&self, json: &JsonValue) -> Result<BuiltDocument> {
        if !json.is_object() {
            return Err(Error::conversion(format!("expected a JSON object, got {:?}", json_type_of(json))));
        }
        let id = self.identity_of(json)
            .ok_or_else(|| Error::conversion(format!("document has no usable '{}'", self.identity_field)))?;
        let content_type = self.content_type_of(json);

        let mut context = BuildContext::new(&content_type);
        self.visit(json, &PathContext::new(&content_type, ""), &mut context)?;
        self.check_analyzers(&context.document)?;

        let source = pack(&serde_json::to_vec(json)?, self.source_compression)?;
        context.document.add_field(Field::stored(&self.source_field, source));

        Ok(BuiltDocument {
            id,
            content_type,
            document: context.document,
            field_infos: context.field_infos,
            schema: JsonSchema::infer(json),
        })
    }

    /// Unknown analyzers fail here, before the writer deletes anything the
    /// document replaces.
    fn check_analyzers(&self, document: &Document) -> Result<()> {
        for field in &document.fields {
            if let FieldValue::Text { analyzer, .. } = &field.value {
                if self.analyzers.get(analyzer).is_none() {
                    return Err(Error::conversion(format!(
                        "field '{}' uses unknown analyzer '{}'", field.name, analyzer
                    )));
                }
            }
        }
        Ok(())
    }

    fn visit(&self, value: &JsonValue, path: &PathContext, context: &mut BuildContext) -> Result<()> {
        if let JsonValue::Object(properties) = value {
            for (key, child) in properties {
                self.visit(child, &path.child(key), context)?;
            }
            return Ok(());
        }

        let json_type = json_type_of(value);
        if let Some(strategy) = self.configuration.resolve(&path.content_type, &path.path, json_type) {
            for projected in strategy.create_fields(value, path)? {
                context.add(projected);
            }
        }

        // Elements share the array's path
        if let JsonValue::Array(elements) = value {
            for element in elements {
                self.visit(element, path, context)?;
            }
        }
        Ok(())
    }
}
