use serde::{Serialize, Deserialize};

/// A single analyzed term with its position for phrase matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,     // Term position, preserved across removed tokens
    pub offset: usize,     // Byte offset in original text
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Word,
    Number,
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        Token {
            text,
            position,
            offset,
            token_type: TokenType::Word,
        }
    }
}
