pub mod types;
pub mod config;
pub mod error;
pub mod utils;
pub mod index;
