pub mod ast;
pub mod lexer;
pub mod parser;
pub mod optimizer;
pub mod lowering;
pub mod cache;
