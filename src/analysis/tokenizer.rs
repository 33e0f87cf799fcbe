use crate::analysis::token::{Token, TokenType};
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

/// Standard Unicode word tokenizer
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            if word.len() > self.max_token_length {
                continue;
            }

            let mut token = Token::new(word.to_string(), position, offset);
            if word.chars().all(|c| c.is_numeric()) {
                token.token_type = TokenType::Number;
            }
            tokens.push(token);
            position += 1;
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}

/// Emits the whole input as a single token.
#[derive(Clone, Default)]
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::new(text.to_string(), 0, 0)]
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(KeywordTokenizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_word_boundaries_with_offsets() {
        let tokens = StandardTokenizer::default().tokenize("Hello, brave new-world 42");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "brave", "new", "world", "42"]);
        assert_eq!(tokens[1].offset, 7);
        assert_eq!(tokens[4].position, 4);
        assert!(matches!(tokens[4].token_type, TokenType::Number));
    }

    #[test]
    fn keyword_tokenizer_keeps_input_whole() {
        let tokens = KeywordTokenizer.tokenize("DOC_001 x");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "DOC_001 x");
    }
}
