use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::document::builder::DocumentBuilder;
use crate::fields::configuration::FieldConfiguration;
use crate::index::index_writer::IndexWriter;
use crate::index::query::{Query, SortSpec};
use crate::index::searcher::Searcher;
use crate::inflow::scheduler::{PauseSwitch, Scheduler, WorkerPool};
use crate::query::ast::QueryAst;
use crate::query::cache::{CacheStats, QueryCache, QueryKey};
use crate::query::lowering::{lower, LoweringContext};
use crate::query::optimizer::QueryOptimizer;
use crate::query::parser::parse;
use crate::schema::field_info::FieldInfoIndex;
use crate::schema::schema::SchemaIndex;
use crate::search::results::{rehydrate, SearchResults};
use crate::storage::directory::{Directory, FsDirectory, RamDirectory};
use crate::storage::snapshot::{self, SnapshotSource, SnapshotTarget};
use crate::writer::json_writer::{IndexState, JsonIndexWriter};

/// Embedded JSON document index: write through `writer()`, query with `search`.
pub struct JsonIndex {
    config: Config,
    directory: Arc<dyn Directory>,
    analyzers: Arc<AnalyzerRegistry>,
    fields: Arc<FieldConfiguration>,
    workers: WorkerPool,
    writer: JsonIndexWriter,
    state: Arc<RwLock<IndexState>>,
    optimizer: QueryOptimizer,
    cache: QueryCache,
}

impl JsonIndex {
    /// Open the index at `config.storage_path`, or in memory when unset.
    pub fn open(config: Config) -> Result<Self> {
        let directory: Arc<dyn Directory> = match &config.storage_path {
            Some(path) => Arc::new(FsDirectory::open(path)?),
            None => Arc::new(RamDirectory::new()),
        };
        Self::open_with_directory(config, directory)
    }

    pub fn open_with_directory(config: Config, directory: Arc<dyn Directory>) -> Result<Self> {
        let fields = Arc::new(FieldConfiguration::new(vec![
            config.identity_field.clone(),
            config.content_type_field.clone(),
        ]));
        Self::start(config, directory, Arc::new(AnalyzerRegistry::new()), fields)
    }

    fn start(
        config: Config,
        directory: Arc<dyn Directory>,
        analyzers: Arc<AnalyzerRegistry>,
        fields: Arc<FieldConfiguration>,
    ) -> Result<Self> {
        let writer = IndexWriter::open(directory.clone(), analyzers.clone(), config.source_compression)?;
        let generation = writer.generation();
        let state = Arc::new(RwLock::new(IndexState::open(writer, &config.identity_field)?));

        let scheduler = Arc::new(Scheduler::new(config.capacity_ceiling));
        let workers = WorkerPool::start(scheduler.clone(), config.worker_threads, config.pause_poll_interval)?;
        let builder = Arc::new(DocumentBuilder::new(&config, fields.clone()).with_analyzers(analyzers.clone()));
        let writer = JsonIndexWriter::new(scheduler, builder, state.clone(), config.batch_size);

        tracing::info!(generation, workers = config.worker_threads, "index opened");
        Ok(JsonIndex {
            optimizer: QueryOptimizer::new(config.default_operator, &config.content_type_field),
            cache: QueryCache::new(config.query_cache_size),
            config,
            directory,
            analyzers,
            fields,
            workers,
            writer,
            state,
        })
    }

    pub fn writer(&self) -> &JsonIndexWriter {
        &self.writer
    }

    /// Per content type, per path strategy overrides.
    pub fn field_configuration(&self) -> &Arc<FieldConfiguration> {
        &self.fields
    }

    pub fn analyzers(&self) -> &Arc<AnalyzerRegistry> {
        &self.analyzers
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pause_switch(&self) -> PauseSwitch {
        self.workers.scheduler().pause_switch()
    }

    pub fn search(&self, text: &str) -> Result<SearchResults> {
        self.search_with_limit(text, usize::MAX)
    }

    pub fn search_with_limit(&self, text: &str, limit: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let ast = self.compile(text)?;

        let state = self.state.read();
        let (query, sort) = self.lower(&ast, &state.field_infos)?;
        let index = state.writer.index();
        let index = index.read();
        let (docs, total_hits) = Searcher::new(&index).search(&query, sort.as_ref(), limit)?;

        let hits = docs
            .into_iter()
            .map(|doc| rehydrate(&index, doc, &self.config.source_field, &self.config.identity_field))
            .collect::<Result<Vec<_>>>()?;

        let took_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(query = text, total_hits, took_ms, "search");
        Ok(SearchResults { hits, total_hits, took_ms })
    }

    /// Matching document count, without rehydrating hits.
    pub fn count(&self, text: &str) -> Result<u64> {
        let ast = self.compile(text)?;
        let state = self.state.read();
        let (query, _) = self.lower(&ast, &state.field_infos)?;
        let index = state.writer.index();
        let count = Searcher::new(&index.read()).count(&query)?;
        Ok(count)
    }

    /// Parsed and optimized tree for the query text, cached per text.
    pub fn compile(&self, text: &str) -> Result<QueryAst> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "query text is blank"));
        }
        let key = QueryKey { query: text.to_string(), operator: self.config.default_operator };
        self.cache.get_or_compile(key, |key| Ok(self.optimizer.optimize(parse(&key.query)?)))
    }

    /// Native query and sort for the query text against current field infos.
    pub fn explain(&self, text: &str) -> Result<(Query, Option<SortSpec>)> {
        let ast = self.compile(text)?;
        let state = self.state.read();
        self.lower(&ast, &state.field_infos)
    }

    fn lower(&self, ast: &QueryAst, field_infos: &FieldInfoIndex) -> Result<(Query, Option<SortSpec>)> {
        let context = LoweringContext {
            field_infos,
            analyzers: &self.analyzers,
            now: Utc::now(),
            phrase_slop: self.config.phrase_slop,
            fuzzy_max_edits: self.config.fuzzy_max_edits,
        };
        lower(ast, &context)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn num_docs(&self) -> u64 {
        self.state.read().writer.index().read().num_docs()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().writer.generation()
    }

    pub fn field_infos(&self) -> FieldInfoIndex {
        self.state.read().field_infos.clone()
    }

    pub fn schemas(&self) -> SchemaIndex {
        self.state.read().schemas.clone()
    }

    /// Inferred JSON schema of one content type.
    pub fn schema_json(&self, content_type: &str) -> Option<JsonValue> {
        self.state.read().schemas.get(content_type).map(|s| s.to_json())
    }

    /// Copy the last commit to the target. Returns the snapshot generation.
    pub fn snapshot(&self, target: &dyn SnapshotTarget) -> Result<u64> {
        let _state = self.state.read();
        snapshot::snapshot(self.directory.as_ref(), target)
    }

    /// Close this index, replace its directory contents with the snapshot and
    /// reopen. On failure the index stays closed.
    pub fn restore(mut self, source: &dyn SnapshotSource) -> Result<JsonIndex> {
        self.workers.shutdown();
        let JsonIndex { config, directory, analyzers, fields, state, writer, .. } = self;
        drop(writer);
        drop(state);

        snapshot::restore(directory.as_ref(), source)?;
        Self::start(config, directory, analyzers, fields)
    }

    /// Stop the workers. Uncommitted writes are discarded.
    pub fn close(mut self) {
        self.workers.shutdown();
        tracing::info!("index closed");
    }
}
