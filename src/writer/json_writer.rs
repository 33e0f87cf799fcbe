use std::collections::BTreeMap;
use std::sync::Arc;
use crossbeam::channel::bounded;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use crate::core::error::{Error, Result};
use crate::document::builder::{BuiltDocument, DocumentBuilder};
use crate::index::index_writer::IndexWriter;
use crate::inflow::queue::Priority;
use crate::inflow::scheduler::Scheduler;
use crate::inflow::slot::SlotChain;
use crate::inflow::source::{BatchSource, IngestHandle};
use crate::schema::field_info::FieldInfoIndex;
use crate::schema::schema::SchemaIndex;
use crate::writer::jobs::{CommitJob, ConvertJob, SlotValue, WriteRequest, WriterOp};

pub const FIELD_INFOS_KEY: &str = "jsondex.fieldInfos";
pub const SCHEMAS_KEY: &str = "jsondex.schemas";

/// Native writer plus the metadata that travels with its commits. Only the
/// slot chain sink mutates it, one completion at a time.
pub struct IndexState {
    pub writer: IndexWriter,
    pub field_infos: FieldInfoIndex,
    pub schemas: SchemaIndex,
    identity_field: String,
    failure: Option<Error>,
}

impl IndexState {
    /// Wrap a freshly opened writer, loading metadata from its last commit.
    pub fn open(writer: IndexWriter, identity_field: &str) -> Result<Self> {
        let field_infos = match writer.user_data().get(FIELD_INFOS_KEY) {
            Some(raw) => serde_json::from_str(raw)?,
            None => FieldInfoIndex::new(),
        };
        let schemas = match writer.user_data().get(SCHEMAS_KEY) {
            Some(raw) => serde_json::from_str(raw)?,
            None => SchemaIndex::new(),
        };
        Ok(IndexState {
            writer,
            field_infos,
            schemas,
            identity_field: identity_field.to_string(),
            failure: None,
        })
    }

    fn apply(&mut self, value: SlotValue) {
        match value {
            SlotValue::Ops(ops) => {
                if let Err(e) = self.apply_ops(ops) {
                    tracing::warn!(error = %e, "applying converted documents failed");
                    self.failure.get_or_insert(e);
                }
            }
            SlotValue::Failed(e) => {
                tracing::warn!(error = %e, "conversion failed, next commit will be refused");
                self.failure.get_or_insert(e);
            }
            SlotValue::Commit(reply) => {
                let result = match self.failure.take() {
                    Some(e) => Err(Error::conversion(format!("commit refused after failed write: {}", e.context))),
                    None => self.commit(),
                };
                if reply.send(result).is_err() {
                    tracing::debug!("commit caller went away");
                }
            }
            SlotValue::Noop => {}
        }
    }

    fn apply_ops(&mut self, ops: Vec<WriterOp>) -> Result<()> {
        for op in ops {
            match op {
                WriterOp::Add(doc) => {
                    self.record(&doc);
                    self.writer.add_document(doc.document)?;
                }
                WriterOp::Update(doc) => {
                    self.record(&doc);
                    self.writer.update_document(&self.identity_field, &doc.id, doc.document)?;
                }
                WriterOp::Delete(id) => {
                    self.writer.delete_term(&self.identity_field, &id);
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, doc: &BuiltDocument) {
        self.field_infos.merge(&doc.content_type, &doc.field_infos);
        self.schemas.merge(&doc.content_type, &doc.schema);
    }

    fn commit(&mut self) -> Result<u64> {
        let user_data = BTreeMap::from([
            (FIELD_INFOS_KEY.to_string(), serde_json::to_string(&self.field_infos)?),
            (SCHEMAS_KEY.to_string(), serde_json::to_string(&self.schemas)?),
        ]);
        let generation = self.writer.commit(user_data)?;
        tracing::info!(generation, docs = self.writer.index().read().num_docs(), "index committed");
        Ok(generation)
    }
}

#[derive(Clone)]
struct Submitter {
    scheduler: Arc<Scheduler>,
    chain: SlotChain<SlotValue>,
    builder: Arc<DocumentBuilder>,
    batch_size: usize,
}

impl Submitter {
    /// Reserve one slot for the whole write, split it per chunk and queue a
    /// conversion job for each chunk.
    fn submit(&self, requests: Vec<WriteRequest>, priority: Priority) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let root = self.chain.reserve();
        let mut requests = requests.into_iter().peekable();
        while requests.peek().is_some() {
            let chunk: Vec<WriteRequest> = requests.by_ref().take(self.batch_size).collect();
            let job = ConvertJob::new(self.builder.clone(), chunk, root.split());
            self.scheduler.enqueue(Box::new(job), priority)?;
        }
        root.ready(SlotValue::Noop);
        Ok(())
    }
}

/// Asynchronous write API over the inflow pipeline. Writes return once
/// queued; `commit` blocks until every earlier write is durable.
pub struct JsonIndexWriter {
    submitter: Submitter,
    state: Arc<RwLock<IndexState>>,
}

impl JsonIndexWriter {
    pub fn new(
        scheduler: Arc<Scheduler>,
        builder: Arc<DocumentBuilder>,
        state: Arc<RwLock<IndexState>>,
        batch_size: usize,
    ) -> Self {
        let sink_state = state.clone();
        let chain = SlotChain::new(move |value| sink_state.write().apply(value));
        JsonIndexWriter {
            submitter: Submitter { scheduler, chain, builder, batch_size: batch_size.max(1) },
            state,
        }
    }

    pub fn create(&self, documents: Vec<JsonValue>) -> Result<()> {
        self.write(documents.into_iter().map(WriteRequest::Create).collect(), Priority::High)
    }

    pub fn update(&self, documents: Vec<JsonValue>) -> Result<()> {
        self.write(documents.into_iter().map(WriteRequest::Update).collect(), Priority::High)
    }

    pub fn delete<S: Into<String>>(&self, ids: impl IntoIterator<Item = S>) -> Result<()> {
        self.write(ids.into_iter().map(|id| WriteRequest::Delete(id.into())).collect(), Priority::High)
    }

    pub fn write(&self, requests: Vec<WriteRequest>, priority: Priority) -> Result<()> {
        self.submitter.submit(requests, priority)
    }

    /// Commit everything written before this call. Fails with a conversion
    /// error when an earlier write could not be converted.
    pub fn commit(&self) -> Result<u64> {
        let (reply, done) = bounded(1);
        let slot = self.submitter.chain.reserve();
        self.submitter.scheduler.enqueue(Box::new(CommitJob::new(slot, reply)), Priority::Highest)?;
        done.recv()
            .map_err(|_| Error::invalid_state("index closed before the commit completed"))?
    }

    /// Feed documents from an iterator, pulled in batches as capacity allows.
    pub fn ingest<I>(&self, documents: I) -> IngestHandle
    where
        I: IntoIterator<Item = JsonValue>,
        I::IntoIter: Send + 'static,
    {
        let submitter = self.submitter.clone();
        let (source, handle) = BatchSource::new(
            documents.into_iter(),
            self.submitter.batch_size,
            move |batch: Vec<JsonValue>| {
                submitter.submit(batch.into_iter().map(WriteRequest::Create).collect(), Priority::Medium)
            },
        );
        self.submitter.scheduler.add_source(Arc::new(source));
        handle
    }

    pub fn state(&self) -> &Arc<RwLock<IndexState>> {
        &self.state
    }
}
