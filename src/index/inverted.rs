use std::collections::{BTreeMap, HashMap};
use roaring::RoaringBitmap;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::token::Token;
use crate::core::error::Result;
use crate::core::types::{DocId, Document, FieldValue};
use crate::index::posting::PostingList;
use crate::index::query::Numeric;

/// Gap between repeated instances of one field (array elements), so phrases
/// never span two elements.
const POSITION_GAP: u32 = 100;

/// First value of a field, used for sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Numeric(Numeric),
    Text(String),
}

/// Document whose text fields have been analyzed, ready to insert.
pub struct AnalyzedDocument<'d> {
    doc: &'d Document,
    tokens: Vec<Option<Vec<Token>>>,
}

/// In-memory inverted index. Deleted documents keep their postings and are
/// masked by the live bitmap.
#[derive(Default)]
pub struct InvertedIndex {
    terms: HashMap<String, BTreeMap<String, PostingList>>,
    numerics: HashMap<String, BTreeMap<DocId, Vec<Numeric>>>,
    doc_values: HashMap<String, HashMap<DocId, DocValue>>,
    stored: HashMap<DocId, Vec<(String, Vec<u8>)>>,
    live: RoaringBitmap,
    next_doc: u32,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    pub fn add_document(&mut self, doc: &Document, analyzers: &AnalyzerRegistry) -> Result<DocId> {
        let analyzed = Self::analyze(doc, analyzers)?;
        Ok(self.insert(analyzed))
    }

    /// Run every text field through its analyzer. Fails without touching
    /// any index, so callers can analyze before deleting what a document
    /// replaces.
    pub fn analyze<'d>(doc: &'d Document, analyzers: &AnalyzerRegistry) -> Result<AnalyzedDocument<'d>> {
        let tokens = doc.fields
            .iter()
            .map(|field| match &field.value {
                FieldValue::Text { text, analyzer } if field.indexed => analyzers.analyze(analyzer, text).map(Some),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AnalyzedDocument { doc, tokens })
    }

    pub fn insert(&mut self, analyzed: AnalyzedDocument<'_>) -> DocId {
        let doc_id = DocId(self.next_doc);
        self.next_doc += 1;

        let mut next_position: HashMap<&str, u32> = HashMap::new();

        for (field, tokens) in analyzed.doc.fields.iter().zip(&analyzed.tokens) {
            if field.stored {
                if let FieldValue::Stored(bytes) = &field.value {
                    self.stored.entry(doc_id).or_default().push((field.name.clone(), bytes.clone()));
                }
            }
            if !field.indexed {
                continue;
            }

            let base = next_position.get(field.name.as_str()).copied().unwrap_or(0);
            let doc_value = match &field.value {
                FieldValue::Term(term) => {
                    self.postings_mut(&field.name, term).add_occurrence(doc_id, base);
                    next_position.insert(&field.name, base + 1 + POSITION_GAP);
                    Some(DocValue::Text(term.clone()))
                }
                FieldValue::Text { text, .. } => {
                    let mut last = base;
                    for token in tokens.iter().flatten() {
                        let position = base + token.position;
                        self.postings_mut(&field.name, &token.text).add_occurrence(doc_id, position);
                        last = position;
                    }
                    next_position.insert(&field.name, last + 1 + POSITION_GAP);
                    Some(DocValue::Text(text.to_lowercase()))
                }
                FieldValue::Long(v) => {
                    self.add_numeric(&field.name, doc_id, Numeric::Long(*v));
                    Some(DocValue::Numeric(Numeric::Long(*v)))
                }
                FieldValue::Double(v) => {
                    self.add_numeric(&field.name, doc_id, Numeric::Double(*v));
                    Some(DocValue::Numeric(Numeric::Double(*v)))
                }
                FieldValue::Stored(_) => None,
            };

            if let Some(value) = doc_value {
                self.doc_values.entry(field.name.clone()).or_default().entry(doc_id).or_insert(value);
            }
        }

        self.live.insert(doc_id.0);
        doc_id
    }

    fn postings_mut(&mut self, field: &str, term: &str) -> &mut PostingList {
        self.terms
            .entry(field.to_string())
            .or_default()
            .entry(term.to_string())
            .or_default()
    }

    fn add_numeric(&mut self, field: &str, doc_id: DocId, value: Numeric) {
        self.numerics
            .entry(field.to_string())
            .or_default()
            .entry(doc_id)
            .or_default()
            .push(value);
    }

    /// Mark every live document holding the term deleted. Returns how many.
    pub fn delete_term(&mut self, field: &str, term: &str) -> u64 {
        let docs = match self.postings(field, term) {
            Some(list) => list.docs() & &self.live,
            None => return 0,
        };
        let count = docs.len();
        self.live -= docs;
        count
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.terms.get(field)?.get(term)
    }

    /// Terms of a field in lexical order.
    pub fn field_terms(&self, field: &str) -> impl Iterator<Item = (&String, &PostingList)> {
        self.terms.get(field).into_iter().flatten()
    }

    pub fn numeric_values(&self, field: &str) -> impl Iterator<Item = (&DocId, &Vec<Numeric>)> {
        self.numerics.get(field).into_iter().flatten()
    }

    pub fn doc_value(&self, field: &str, doc_id: DocId) -> Option<&DocValue> {
        self.doc_values.get(field)?.get(&doc_id)
    }

    pub fn stored_field(&self, doc_id: DocId, name: &str) -> Option<&[u8]> {
        self.stored.get(&doc_id)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn live_docs(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn num_docs(&self) -> u64 {
        self.live.len()
    }

    pub fn max_doc(&self) -> u32 {
        self.next_doc
    }

    pub fn clear(&mut self) {
        *self = InvertedIndex::default();
    }
}
