pub mod builder;
pub mod context;
