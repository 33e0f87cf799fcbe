pub mod field;
pub mod strategy;
pub mod strategies;
pub mod configuration;
