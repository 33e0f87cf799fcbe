use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for",
    "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with",
];

/// Drops stop words. Remaining tokens keep their original positions, so
/// phrase slop still counts the removed words.
#[derive(Clone)]
pub struct StopWordFilter {
    pub stop_words: HashSet<String>,
}

impl StopWordFilter {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWordFilter {
            stop_words: stop_words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn english() -> Self {
        StopWordFilter::new(ENGLISH_STOP_WORDS.iter().copied())
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        tokens.retain(|token| !self.stop_words.contains(&token.text));
        tokens
    }

    fn name(&self) -> &str {
        "stop_words"
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_leaves_position_gaps() {
        let tokens = ["the", "red", "car"]
            .iter()
            .enumerate()
            .map(|(i, w)| Token::new(w.to_string(), i as u32, 0))
            .collect();
        let out = StopWordFilter::english().filter(tokens);
        let kept: Vec<(&str, u32)> = out.iter().map(|t| (t.text.as_str(), t.position)).collect();
        assert_eq!(kept, vec![("red", 1), ("car", 2)]);
    }
}
