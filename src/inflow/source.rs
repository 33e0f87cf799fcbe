use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use crate::core::error::{Error, Result};
use crate::inflow::scheduler::{InflowSource, Scheduler};

type Submit<T> = Box<dyn Fn(Vec<T>) -> Result<()> + Send + Sync>;

struct SourceState<I> {
    items: I,
    submitted: usize,
    done: Option<Sender<Result<usize>>>,
}

/// Pulls fixed-size batches from an iterator whenever a worker finds spare
/// capacity, handing each batch to `submit`.
pub struct BatchSource<I: Iterator> {
    state: Mutex<SourceState<I>>,
    batch_size: usize,
    submit: Submit<I::Item>,
}

impl<I> BatchSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    pub fn new<F>(items: I, batch_size: usize, submit: F) -> (Self, IngestHandle)
    where
        F: Fn(Vec<I::Item>) -> Result<()> + Send + Sync + 'static,
    {
        let (tx, rx) = bounded(1);
        let source = BatchSource {
            state: Mutex::new(SourceState { items, submitted: 0, done: Some(tx) }),
            batch_size: batch_size.max(1),
            submit: Box::new(submit),
        };
        (source, IngestHandle { done: rx })
    }
}

impl<I> InflowSource for BatchSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    fn pull(&self, _scheduler: &Scheduler) -> bool {
        let mut state = self.state.lock();
        let Some(done) = state.done.clone() else {
            return false;
        };

        let batch: Vec<I::Item> = state.items.by_ref().take(self.batch_size).collect();
        let exhausted = batch.len() < self.batch_size;
        if !batch.is_empty() {
            let size = batch.len();
            if let Err(e) = (self.submit)(batch) {
                tracing::error!(error = %e, "ingest batch rejected");
                state.done = None;
                let _ = done.send(Err(e));
                return false;
            }
            state.submitted += size;
        }

        if exhausted {
            tracing::debug!(documents = state.submitted, "ingest source exhausted");
            state.done = None;
            let _ = done.send(Ok(state.submitted));
            return false;
        }
        true
    }
}

/// Completion of a `BatchSource`: every item pulled and submitted.
pub struct IngestHandle {
    done: Receiver<Result<usize>>,
}

impl IngestHandle {
    /// Block until the source is exhausted. Returns the submitted item count.
    pub fn wait(self) -> Result<usize> {
        self.done
            .recv()
            .map_err(|_| Error::invalid_state("ingest source dropped before completion"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn batches_are_pulled_until_exhausted() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = batches.clone();
        let (source, handle) = BatchSource::new(0..7, 3, move |batch| {
            sink.lock().push(batch);
            Ok(())
        });
        let scheduler = Scheduler::new(20);

        assert!(source.pull(&scheduler));
        assert!(source.pull(&scheduler));
        assert!(!source.pull(&scheduler));
        assert!(!source.pull(&scheduler));

        assert_eq!(handle.wait().unwrap(), 7);
        assert_eq!(*batches.lock(), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn dropped_source_releases_the_handle() {
        let (source, handle) = BatchSource::new(0..7, 3, |_| Ok(()));
        drop(source);
        assert!(handle.wait().is_err());
    }

    #[test]
    fn submit_errors_reach_the_handle() {
        let (source, handle) = BatchSource::new(0..7, 3, |_| Err(Error::invalid_state("closed")));
        assert!(!source.pull(&Scheduler::new(20)));
        assert!(handle.wait().is_err());
    }
}
