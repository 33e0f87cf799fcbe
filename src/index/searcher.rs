use std::cmp::Ordering;
use regex::Regex;
use roaring::RoaringBitmap;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::core::utils::{levenshtein_distance, wildcard_to_regex};
use crate::index::inverted::{DocValue, InvertedIndex};
use crate::index::posting::positions_match;
use crate::index::query::{
    BoolQuery, FuzzyQuery, NumericRangeQuery, PhraseQuery, Query, SortSpec, TermRangeQuery, WildcardQuery,
};

/// Evaluates native queries against one view of the inverted index.
pub struct Searcher<'a> {
    index: &'a InvertedIndex,
}

impl<'a> Searcher<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Searcher { index }
    }

    /// Matching live documents, sorted when a sort is given and in insertion
    /// order otherwise. `limit` caps the returned ids, not the total count.
    pub fn search(&self, query: &Query, sort: Option<&SortSpec>, limit: usize) -> Result<(Vec<DocId>, u64)> {
        let matched = self.matching(query)?;
        let total = matched.len();

        let mut docs: Vec<DocId> = matched.iter().map(DocId).collect();
        if let Some(sort) = sort.filter(|s| !s.fields.is_empty()) {
            docs.sort_by(|a, b| self.compare(sort, *a, *b));
        }
        docs.truncate(limit);
        Ok((docs, total))
    }

    pub fn count(&self, query: &Query) -> Result<u64> {
        Ok(self.matching(query)?.len())
    }

    /// Live documents matching the query.
    pub fn matching(&self, query: &Query) -> Result<RoaringBitmap> {
        let mut docs = self.evaluate(query)?;
        docs &= self.index.live_docs();
        Ok(docs)
    }

    fn evaluate(&self, query: &Query) -> Result<RoaringBitmap> {
        match query {
            Query::MatchAll => Ok(self.index.live_docs().clone()),
            Query::Term(term) => Ok(self.index
                .postings(&term.field, &term.value)
                .map(|list| list.docs())
                .unwrap_or_default()),
            Query::Phrase(phrase) => Ok(self.phrase(phrase)),
            Query::Bool(bool_query) => self.boolean(bool_query),
            Query::TermRange(range) => Ok(self.term_range(range)),
            Query::NumericRange(range) => Ok(self.numeric_range(range)),
            Query::Wildcard(wildcard) => self.wildcard(wildcard),
            Query::Fuzzy(fuzzy) => Ok(self.fuzzy(fuzzy)),
        }
    }

    fn boolean(&self, query: &BoolQuery) -> Result<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;

        for clause in &query.must {
            let docs = self.evaluate(clause)?;
            result = Some(match result {
                Some(acc) => acc & docs,
                None => docs,
            });
        }

        if query.must.is_empty() {
            // No MUST: at least one SHOULD has to match
            let mut any = RoaringBitmap::new();
            for clause in &query.should {
                any |= self.evaluate(clause)?;
            }
            result = Some(any);
        }

        let mut result = result.unwrap_or_default();
        for clause in &query.must_not {
            if result.is_empty() {
                break;
            }
            result -= self.evaluate(clause)?;
        }
        Ok(result)
    }

    fn phrase(&self, query: &PhraseQuery) -> RoaringBitmap {
        let mut lists = Vec::with_capacity(query.phrase.len());
        for (term, offset) in &query.phrase {
            match self.index.postings(&query.field, term) {
                Some(list) => lists.push((list, *offset)),
                None => return RoaringBitmap::new(),
            }
        }
        let Some((first, _)) = lists.split_first() else {
            return RoaringBitmap::new();
        };

        let mut candidates = first.0.docs();
        for (list, _) in &lists[1..] {
            candidates &= list.docs();
        }

        candidates
            .iter()
            .filter(|&doc| {
                let positions: Option<Vec<(&[u32], u32)>> = lists
                    .iter()
                    .map(|(list, offset)| list.get(DocId(doc)).map(|p| (p.positions.as_slice(), *offset)))
                    .collect();
                positions.is_some_and(|p| positions_match(&p, query.slop))
            })
            .collect()
    }

    fn term_range(&self, query: &TermRangeQuery) -> RoaringBitmap {
        let mut docs = RoaringBitmap::new();
        for (term, list) in self.index.field_terms(&query.field) {
            let above = match &query.lower {
                Some(lower) => term > lower || (query.include_lower && term == lower),
                None => true,
            };
            let below = match &query.upper {
                Some(upper) => term < upper || (query.include_upper && term == upper),
                None => true,
            };
            if above && below {
                docs |= list.docs();
            }
        }
        docs
    }

    fn numeric_range(&self, query: &NumericRangeQuery) -> RoaringBitmap {
        self.index
            .numeric_values(&query.field)
            .filter(|(_, values)| values.iter().any(|v| query.contains(v)))
            .map(|(doc, _)| doc.0)
            .collect()
    }

    fn wildcard(&self, query: &WildcardQuery) -> Result<RoaringBitmap> {
        let regex = Regex::new(&wildcard_to_regex(&query.pattern))?;
        let mut docs = RoaringBitmap::new();
        for (term, list) in self.index.field_terms(&query.field) {
            if regex.is_match(term) {
                docs |= list.docs();
            }
        }
        Ok(docs)
    }

    fn fuzzy(&self, query: &FuzzyQuery) -> RoaringBitmap {
        let max_edits = query.max_edits as usize;
        let target_len = query.term.chars().count();
        let mut docs = RoaringBitmap::new();
        for (term, list) in self.index.field_terms(&query.field) {
            if term.chars().count().abs_diff(target_len) > max_edits {
                continue;
            }
            if levenshtein_distance(term, &query.term) <= max_edits {
                docs |= list.docs();
            }
        }
        docs
    }

    fn compare(&self, sort: &SortSpec, a: DocId, b: DocId) -> Ordering {
        for field in &sort.fields {
            let left = self.index.doc_value(&field.field, a);
            let right = self.index.doc_value(&field.field, b);
            let ordering = match (left, right) {
                (None, None) => Ordering::Equal,
                // Missing values sort last in both directions
                (None, Some(_)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Less,
                (Some(l), Some(r)) => {
                    let ordering = compare_values(l, r);
                    if field.descending { ordering.reverse() } else { ordering }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.cmp(&b)
    }
}

fn compare_values(left: &DocValue, right: &DocValue) -> Ordering {
    match (left, right) {
        (DocValue::Numeric(l), DocValue::Numeric(r)) => l.compare(r).unwrap_or(Ordering::Equal),
        (DocValue::Text(l), DocValue::Text(r)) => l.cmp(r),
        (DocValue::Numeric(_), DocValue::Text(_)) => Ordering::Less,
        (DocValue::Text(_), DocValue::Numeric(_)) => Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerRegistry;
    use crate::core::types::{Document, Field};
    use crate::index::query::{Numeric, SortField, TermQuery};

    fn index() -> InvertedIndex {
        let analyzers = AnalyzerRegistry::new();
        let mut index = InvertedIndex::new();
        let people = [
            ("DOC_001", "Peter Parker", 20, "the red car"),
            ("DOC_002", "Lars Larsen", 25, "a car that is red"),
            ("DOC_003", "Mary Jane", 30, "blue bicycle"),
        ];
        for (id, name, age, note) in people {
            let mut doc = Document::new();
            doc.add_field(Field::term("$id", id));
            doc.add_field(Field::text("name", name, "standard"));
            doc.add_field(Field::long("age", age));
            doc.add_field(Field::text("note", note, "standard"));
            index.add_document(&doc, &analyzers).unwrap();
        }
        index
    }

    fn ids(docs: &[DocId]) -> Vec<u32> {
        docs.iter().map(|d| d.0).collect()
    }

    #[test]
    fn boolean_semantics() {
        let index = index();
        let searcher = Searcher::new(&index);

        let should = Query::should(vec![Query::term("name", "peter"), Query::term("name", "lars")]);
        assert_eq!(searcher.count(&should).unwrap(), 2);

        let must_not_only = Query::Bool(BoolQuery::new().with_must_not(Query::term("name", "peter")));
        assert_eq!(searcher.count(&must_not_only).unwrap(), 0);

        let except = Query::Bool(BoolQuery::new()
            .with_must(Query::MatchAll)
            .with_must_not(Query::term("name", "peter")));
        assert_eq!(searcher.count(&except).unwrap(), 2);

        let must_ignores_should = Query::Bool(BoolQuery::new()
            .with_must(Query::term("name", "mary"))
            .with_should(Query::term("name", "peter")));
        assert_eq!(searcher.count(&must_ignores_should).unwrap(), 1);
    }

    #[test]
    fn phrase_respects_slop() {
        let index = index();
        let searcher = Searcher::new(&index);
        let phrase = |slop| Query::Phrase(PhraseQuery::adjacent("note", ["red", "car"], slop));
        assert_eq!(searcher.count(&phrase(0)).unwrap(), 1);
        assert_eq!(searcher.count(&phrase(5)).unwrap(), 1);

        let reversed = Query::Phrase(PhraseQuery::adjacent("note", ["car", "red"], 5));
        assert_eq!(searcher.count(&reversed).unwrap(), 1);
    }

    #[test]
    fn ranges_wildcards_and_fuzzy() {
        let index = index();
        let searcher = Searcher::new(&index);

        let range = Query::NumericRange(NumericRangeQuery {
            field: "age".into(),
            lower: Some(Numeric::Long(20)),
            upper: None,
            include_lower: false,
            include_upper: false,
        });
        assert_eq!(searcher.count(&range).unwrap(), 2);

        let terms = Query::TermRange(TermRangeQuery {
            field: "$id".into(),
            lower: Some("DOC_002".into()),
            upper: None,
            include_lower: true,
            include_upper: false,
        });
        assert_eq!(searcher.count(&terms).unwrap(), 2);

        let wildcard = Query::Wildcard(WildcardQuery { field: "name".into(), pattern: "pet*".into() });
        assert_eq!(searcher.count(&wildcard).unwrap(), 1);

        let fuzzy = Query::Fuzzy(FuzzyQuery { field: "name".into(), term: "larsn".into(), max_edits: 1 });
        assert_eq!(searcher.count(&fuzzy).unwrap(), 1);
    }

    #[test]
    fn sorts_by_doc_values_with_limit() {
        let index = index();
        let searcher = Searcher::new(&index);
        let sort = SortSpec { fields: vec![SortField { field: "age".into(), descending: true }] };

        let (docs, total) = searcher.search(&Query::MatchAll, Some(&sort), 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(ids(&docs), vec![2, 1]);

        let missing = SortSpec { fields: vec![SortField { field: "missing".into(), descending: true }] };
        let (docs, _) = searcher.search(&Query::MatchAll, Some(&missing), 10).unwrap();
        assert_eq!(ids(&docs), vec![0, 1, 2]);
    }

    #[test]
    fn deleted_documents_never_match() {
        let mut index = index();
        index.delete_term("$id", "DOC_001");
        let searcher = Searcher::new(&index);
        let query = Query::Term(TermQuery { field: "$id".into(), value: "DOC_001".into() });
        assert_eq!(searcher.count(&query).unwrap(), 0);
        assert_eq!(searcher.count(&Query::MatchAll).unwrap(), 2);
    }
}
