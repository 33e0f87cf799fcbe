pub mod field_info;
pub mod schema;
