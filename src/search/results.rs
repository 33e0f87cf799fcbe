use serde_json::Value as JsonValue;
use crate::compression::compress::unpack;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::index::inverted::InvertedIndex;

/// Search results container
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,   // Matches before the limit was applied
    pub took_ms: u64,
}

/// One matching document, rehydrated from its stored source
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub id: Option<String>,
    pub source: JsonValue,
}

impl SearchResults {
    pub fn empty() -> Self {
        SearchResults { hits: Vec::new(), total_hits: 0, took_ms: 0 }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Values of a top-level property across hits, in hit order.
    pub fn values_of<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a JsonValue> + 'a {
        self.hits.iter().filter_map(move |hit| hit.source.get(property))
    }
}

/// Read a hit back from the stored source field; indexed fields are never
/// used to rebuild JSON.
pub fn rehydrate(index: &InvertedIndex, doc_id: DocId, source_field: &str, identity_field: &str) -> Result<SearchHit> {
    let stored = index.stored_field(doc_id, source_field).ok_or_else(|| {
        Error::new(ErrorKind::Corrupted, format!("document {} has no stored '{}'", doc_id.0, source_field))
    })?;
    let source: JsonValue = serde_json::from_slice(&unpack(stored)?)?;
    let id = match source.get(identity_field) {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Ok(SearchHit { doc_id, id, source })
}
