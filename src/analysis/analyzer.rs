use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};

/// Text analysis pipeline. The same instance is used when projecting text
/// fields and when lowering phrase values, so both sides agree on terms.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Unicode words, lowercased. Default for text fields.
    pub fn standard() -> Self {
        Analyzer::new(STANDARD.to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    /// Standard plus English stop words and stemming
    pub fn english() -> Self {
        Analyzer::new(ENGLISH.to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    /// Whole value as one lowercased term
    pub fn keyword() -> Self {
        Analyzer::new(KEYWORD.to_string(), Box::new(KeywordTokenizer))
            .add_filter(Box::new(LowercaseFilter))
    }
}

pub const STANDARD: &str = "standard";
pub const ENGLISH: &str = "english";
pub const KEYWORD: &str = "keyword";

/// Registry for managing analyzers
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
        };

        registry.register(STANDARD, Analyzer::standard());
        registry.register(ENGLISH, Analyzer::english());
        registry.register(KEYWORD, Analyzer::keyword());
        registry
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        self.analyzers.write().insert(name.to_string(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        self.get(analyzer_name)
            .map(|analyzer| analyzer.analyze(text))
            .ok_or_else(|| Error::new(
                ErrorKind::NotFound,
                format!("Analyzer '{}' not found", analyzer_name),
            ))
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn standard_lowercases_words() {
        let registry = AnalyzerRegistry::new();
        let tokens = registry.analyze(STANDARD, "Peter Parker").unwrap();
        assert_eq!(texts(&tokens), vec!["peter", "parker"]);
    }

    #[test]
    fn english_drops_stop_words_but_keeps_positions() {
        let tokens = Analyzer::english().analyze("The running dogs");
        assert_eq!(texts(&tokens), vec!["run", "dog"]);
        assert_eq!(tokens[0].position, 1);
        assert_eq!(tokens[1].position, 2);
    }

    #[test]
    fn unknown_analyzer_is_not_found() {
        let err = AnalyzerRegistry::new().analyze("klingon", "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
