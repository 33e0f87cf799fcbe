use std::collections::{BTreeMap, BTreeSet, HashMap};
use serde::{Serialize, Deserialize};
use crate::core::types::FieldType;

/// JSON-level type of a projected value. `Date` and `TimeSpan` are strings
/// recognised by their format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JsonType {
    Object,
    Array,
    String,
    Integer,
    Float,
    Boolean,
    Null,
    Undefined,
    Date,
    TimeSpan,
}

/// One observed `(json type, native field, native type, strategy)` tuple for a path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldInfo {
    pub path: String,
    pub json_type: JsonType,
    pub field_name: String,
    pub field_type: FieldType,
    pub strategy: String,
    /// Analyzer of text fields
    pub analyzer: Option<String>,
}

/// Field infos of one content type, keyed by source path. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfoCollection {
    paths: BTreeMap<String, BTreeSet<FieldInfo>>,
}

impl FieldInfoCollection {
    pub fn new() -> Self {
        FieldInfoCollection { paths: BTreeMap::new() }
    }

    /// Returns true when the info was not seen before.
    pub fn add(&mut self, info: FieldInfo) -> bool {
        self.paths.entry(info.path.clone()).or_default().insert(info)
    }

    pub fn merge(&mut self, other: &FieldInfoCollection) -> usize {
        let mut added = 0;
        for infos in other.paths.values() {
            for info in infos {
                if self.add(info.clone()) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn get(&self, path: &str) -> impl Iterator<Item = &FieldInfo> {
        self.paths.get(path).into_iter().flatten()
    }

    /// Every info whose native field name matches. A query names native
    /// fields, which differ from the path for sub-fields such as `created.@year`.
    pub fn by_field_name<'a>(&'a self, field_name: &'a str) -> impl Iterator<Item = &'a FieldInfo> + 'a {
        self.paths.values().flatten().filter(move |i| i.field_name == field_name)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn infos(&self) -> impl Iterator<Item = &FieldInfo> {
        self.paths.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.paths.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Field infos for every content type of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfoIndex {
    content_types: HashMap<String, FieldInfoCollection>,
}

/// How query-time resolution classifies a native field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKind {
    Numeric(FieldType),
    Date,
    Lexical,
    Unknown,
}

impl FieldInfoIndex {
    pub fn new() -> Self {
        FieldInfoIndex { content_types: HashMap::new() }
    }

    pub fn merge(&mut self, content_type: &str, collection: &FieldInfoCollection) -> usize {
        let added = self.content_types
            .entry(content_type.to_string())
            .or_default()
            .merge(collection);
        if added > 0 {
            tracing::debug!(content_type, added, "field infos extended");
        }
        added
    }

    pub fn collection(&self, content_type: &str) -> Option<&FieldInfoCollection> {
        self.content_types.get(content_type)
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.content_types.keys().map(String::as_str)
    }

    fn scoped<'a>(&'a self, content_types: Option<&'a [String]>) -> Box<dyn Iterator<Item = &'a FieldInfoCollection> + 'a> {
        match content_types {
            Some(names) => Box::new(names.iter().filter_map(move |n| self.content_types.get(n))),
            None => Box::new(self.content_types.values()),
        }
    }

    /// Resolve a queried field name against the observed infos. Dates win
    /// over plain numerics, numerics over lexical fields.
    pub fn resolve(&self, field_name: &str, content_types: Option<&[String]>) -> ResolvedKind {
        let mut kind = ResolvedKind::Unknown;
        for collection in self.scoped(content_types) {
            for info in collection.by_field_name(field_name) {
                kind = match (kind, info.json_type, info.field_type) {
                    (ResolvedKind::Date, _, _) => ResolvedKind::Date,
                    (_, JsonType::Date, FieldType::Term | FieldType::Text) => ResolvedKind::Date,
                    (_, _, FieldType::Long | FieldType::Double) => ResolvedKind::Numeric(info.field_type),
                    (ResolvedKind::Numeric(t), _, _) => ResolvedKind::Numeric(t),
                    _ => ResolvedKind::Lexical,
                };
            }
        }
        kind
    }

    /// Native fields holding analyzed or exact text, in name order.
    pub fn lexical_fields(&self, content_types: Option<&[String]>) -> Vec<String> {
        let mut names = BTreeSet::new();
        for collection in self.scoped(content_types) {
            for info in collection.infos() {
                if matches!(info.field_type, FieldType::Term | FieldType::Text) && !info.field_name.starts_with('$') {
                    names.insert(info.field_name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    pub fn is_text(&self, field_name: &str, content_types: Option<&[String]>) -> bool {
        self.analyzer_for(field_name, content_types).is_some()
    }

    /// Analyzer of the first text info recorded for the field.
    pub fn analyzer_for(&self, field_name: &str, content_types: Option<&[String]>) -> Option<String> {
        self.scoped(content_types)
            .flat_map(|c| c.by_field_name(field_name))
            .find(|i| i.field_type == FieldType::Text)
            .map(|i| i.analyzer.clone().unwrap_or_else(|| crate::analysis::analyzer::STANDARD.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str, json_type: JsonType, field: &str, field_type: FieldType) -> FieldInfo {
        FieldInfo {
            path: path.to_string(),
            json_type,
            field_name: field.to_string(),
            field_type,
            strategy: "test".to_string(),
            analyzer: None,
        }
    }

    #[test]
    fn drifting_shapes_are_unioned() {
        let mut collection = FieldInfoCollection::new();
        assert!(collection.add(info("age", JsonType::Integer, "age", FieldType::Long)));
        assert!(collection.add(info("age", JsonType::String, "age", FieldType::Text)));
        assert!(!collection.add(info("age", JsonType::Integer, "age", FieldType::Long)));
        assert_eq!(collection.get("age").count(), 2);
    }

    #[test]
    fn resolution_prefers_dates_then_numbers() {
        let mut first = FieldInfoCollection::new();
        first.add(info("age", JsonType::String, "age", FieldType::Text));
        first.add(info("age", JsonType::Integer, "age", FieldType::Long));
        first.add(info("created", JsonType::Date, "created", FieldType::Term));
        first.add(info("created", JsonType::Date, "created.@year", FieldType::Long));

        let mut index = FieldInfoIndex::new();
        index.merge("person", &first);

        assert_eq!(index.resolve("age", None), ResolvedKind::Numeric(FieldType::Long));
        assert_eq!(index.resolve("created", None), ResolvedKind::Date);
        assert_eq!(index.resolve("created.@year", None), ResolvedKind::Numeric(FieldType::Long));
        assert_eq!(index.resolve("missing", None), ResolvedKind::Unknown);
        assert_eq!(index.resolve("age", Some(&["car".to_string()])), ResolvedKind::Unknown);
    }

    #[test]
    fn lexical_fields_skip_reserved_names() {
        let mut collection = FieldInfoCollection::new();
        collection.add(info("name", JsonType::String, "name", FieldType::Text));
        collection.add(info("$id", JsonType::String, "$id", FieldType::Term));
        collection.add(info("age", JsonType::Integer, "age", FieldType::Long));

        let mut index = FieldInfoIndex::new();
        index.merge("person", &collection);
        assert_eq!(index.lexical_fields(None), vec!["name"]);
        assert!(index.is_text("name", None));
    }
}
