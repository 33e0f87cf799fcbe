use crate::analysis::filter::TokenFilter;
use crate::analysis::token::{Token, TokenType};

/// Lowercases word tokens. Numbers pass through untouched.
#[derive(Clone, Copy, Default)]
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in tokens.iter_mut().filter(|t| t.token_type == TokenType::Word) {
            if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "lowercase"
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_in_place_keeping_positions() {
        let tokens = vec![Token::new("Peter".into(), 0, 0), Token::new("PARKER".into(), 3, 6)];
        let out = LowercaseFilter.filter(tokens);
        assert_eq!(out[0].text, "peter");
        assert_eq!((out[1].text.as_str(), out[1].position), ("parker", 3));
    }
}
