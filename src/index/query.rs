use serde::{Serialize, Deserialize};

/// Native query executed by the searcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),                 // Single exact term
    Phrase(PhraseQuery),             // Positional phrase with slop
    Bool(BoolQuery),                 // MUST / SHOULD / MUST_NOT combination
    TermRange(TermRangeQuery),       // Lexical range over terms
    NumericRange(NumericRangeQuery), // Range over i64/f64 values
    Wildcard(WildcardQuery),
    Fuzzy(FuzzyQuery),
    MatchAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    /// Terms with their positions relative to the first term
    pub phrase: Vec<(String, u32)>,
    pub slop: u32,  // Max extra distance between consecutive terms
}

impl PhraseQuery {
    /// Phrase of adjacent terms.
    pub fn adjacent<S: Into<String>>(field: impl Into<String>, terms: impl IntoIterator<Item = S>, slop: u32) -> Self {
        PhraseQuery {
            field: field.into(),
            phrase: terms.into_iter().zip(0u32..).map(|(t, i)| (t.into(), i)).collect(),
            slop,
        }
    }
}

/// Lucene-style boolean clause set. With no MUST clause at least one SHOULD
/// has to match; a query holding only MUST_NOT clauses matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRangeQuery {
    pub field: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub include_lower: bool,
    pub include_upper: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Numeric {
    Long(i64),
    Double(f64),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Long(v) => *v as f64,
            Numeric::Double(v) => *v,
        }
    }

    /// Exact for two longs, otherwise compared as doubles.
    pub fn compare(&self, other: &Numeric) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Numeric::Long(a), Numeric::Long(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRangeQuery {
    pub field: String,
    pub lower: Option<Numeric>,
    pub upper: Option<Numeric>,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl NumericRangeQuery {
    pub fn exact(field: impl Into<String>, value: Numeric) -> Self {
        NumericRangeQuery {
            field: field.into(),
            lower: Some(value),
            upper: Some(value),
            include_lower: true,
            include_upper: true,
        }
    }

    /// Any document holding a value in the field.
    pub fn unbounded(field: impl Into<String>) -> Self {
        NumericRangeQuery {
            field: field.into(),
            lower: None,
            upper: None,
            include_lower: false,
            include_upper: false,
        }
    }

    pub fn contains(&self, value: &Numeric) -> bool {
        use std::cmp::Ordering::*;
        let above = match &self.lower {
            Some(lower) => matches!((value.compare(lower), self.include_lower), (Some(Greater), _) | (Some(Equal), true)),
            None => true,
        };
        let below = match &self.upper {
            Some(upper) => matches!((value.compare(upper), self.include_upper), (Some(Less), _) | (Some(Equal), true)),
            None => true,
        };
        above && below
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String, // `*` and `?`
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyQuery {
    pub field: String,
    pub term: String,
    pub max_edits: u8,
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Term(TermQuery { field: field.into(), value: value.into() })
    }

    pub fn should(queries: Vec<Query>) -> Self {
        Query::Bool(BoolQuery { should: queries, ..BoolQuery::default() })
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }
}

/// Clause role of a lowered node inside its parent boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub fields: Vec<SortField>,
}
