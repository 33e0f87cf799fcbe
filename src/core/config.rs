use std::path::PathBuf;
use std::time::Duration;
use crate::compression::compress::CompressionType;
use crate::query::ast::BooleanOperator;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding segment files. `None` keeps the index in memory.
    pub storage_path: Option<PathBuf>,

    // Query front-end
    pub default_operator: BooleanOperator,     // Resolves implicit juxtaposition
    pub phrase_slop: u32,
    pub fuzzy_max_edits: u8,
    pub query_cache_size: usize,

    // Inflow pipeline
    pub batch_size: usize,                     // Documents per conversion job
    pub capacity_ceiling: usize,               // Max in-flight cost units
    pub worker_threads: usize,
    pub pause_poll_interval: Duration,

    // Document projection
    pub identity_field: String,
    pub content_type_field: String,
    pub default_content_type: String,
    pub source_field: String,
    pub source_compression: CompressionType,
}

impl Config {
    pub fn in_memory() -> Self {
        Config::default()
    }

    pub fn with_storage_path(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: Some(path.into()),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: None,

            default_operator: BooleanOperator::Or,
            phrase_slop: 5,
            fuzzy_max_edits: 2,
            query_cache_size: 256,

            batch_size: 250,
            capacity_ceiling: 20,
            worker_threads: num_cpus::get().max(1),
            pause_poll_interval: Duration::from_millis(10),

            identity_field: "$id".to_string(),
            content_type_field: "$contentType".to_string(),
            default_content_type: "document".to_string(),
            source_field: "$source".to_string(),
            source_compression: CompressionType::LZ4,
        }
    }
}
