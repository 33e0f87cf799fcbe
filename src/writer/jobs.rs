use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use crossbeam::channel::Sender;
use serde_json::Value as JsonValue;
use crate::core::error::{Error, Result};
use crate::document::builder::{BuiltDocument, DocumentBuilder};
use crate::inflow::scheduler::{InflowJob, Scheduler};
use crate::inflow::slot::Slot;

/// One caller-level write against the JSON index.
#[derive(Debug, Clone)]
pub enum WriteRequest {
    Create(JsonValue),
    Update(JsonValue),
    Delete(String),
}

/// Converted write, ready for the native writer.
#[derive(Debug, Clone)]
pub enum WriterOp {
    Add(BuiltDocument),
    Update(BuiltDocument),
    Delete(String),
}

/// What a completed slot hands to the writer, in reservation order.
pub enum SlotValue {
    Ops(Vec<WriterOp>),
    Failed(Error),
    Commit(Sender<Result<u64>>),
    Noop,
}

/// Converts one chunk of write requests off the calling thread.
pub struct ConvertJob {
    builder: Arc<DocumentBuilder>,
    requests: Vec<WriteRequest>,
    slot: Slot<SlotValue>,
}

impl ConvertJob {
    pub fn new(builder: Arc<DocumentBuilder>, requests: Vec<WriteRequest>, slot: Slot<SlotValue>) -> Self {
        ConvertJob { builder, requests, slot }
    }
}

fn convert(builder: &DocumentBuilder, requests: Vec<WriteRequest>) -> Result<Vec<WriterOp>> {
    let mut ops = Vec::with_capacity(requests.len());
    for request in requests {
        let op = match request {
            WriteRequest::Create(json) => WriterOp::Add(builder.build(&builder.prepare(json)?)?),
            WriteRequest::Update(json) => {
                if builder.identity_of(&json).is_none() {
                    return Err(Error::conversion(format!(
                        "update requires an '{}' value", builder.identity_field()
                    )));
                }
                WriterOp::Update(builder.build(&builder.prepare(json)?)?)
            }
            WriteRequest::Delete(id) => WriterOp::Delete(id),
        };
        ops.push(op);
    }
    Ok(ops)
}

impl InflowJob for ConvertJob {
    fn name(&self) -> &str {
        "convert"
    }

    fn execute(self: Box<Self>, _scheduler: &Scheduler) -> Result<()> {
        let ConvertJob { builder, requests, slot } = *self;
        let count = requests.len();

        let outcome = catch_unwind(AssertUnwindSafe(|| convert(&builder, requests)))
            .unwrap_or_else(|_| Err(Error::conversion("document conversion panicked")));
        match outcome {
            Ok(ops) => {
                tracing::trace!(documents = count, "chunk converted");
                slot.ready(SlotValue::Ops(ops));
                Ok(())
            }
            Err(e) => {
                slot.ready(SlotValue::Failed(e.clone()));
                Err(e)
            }
        }
    }
}

/// Marks the commit's position in the slot chain; the writer commits once
/// everything reserved before it has been applied.
pub struct CommitJob {
    slot: Slot<SlotValue>,
    reply: Sender<Result<u64>>,
}

impl CommitJob {
    pub fn new(slot: Slot<SlotValue>, reply: Sender<Result<u64>>) -> Self {
        CommitJob { slot, reply }
    }
}

impl InflowJob for CommitJob {
    fn name(&self) -> &str {
        "commit"
    }

    fn execute(self: Box<Self>, _scheduler: &Scheduler) -> Result<()> {
        let CommitJob { slot, reply } = *self;
        slot.ready(SlotValue::Commit(reply));
        Ok(())
    }
}
