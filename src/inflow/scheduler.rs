use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use parking_lot::Mutex;
use crate::core::error::{Error, Result};
use crate::inflow::capacity::CapacityControl;
use crate::inflow::queue::{Dequeued, PriorityQueue, Priority};

/// Unit of background work executed by an inflow worker.
pub trait InflowJob: Send {
    fn name(&self) -> &str;

    /// Capacity units held while queued or running
    fn cost(&self) -> usize {
        1
    }

    fn execute(self: Box<Self>, scheduler: &Scheduler) -> Result<()>;
}

/// Pull-based producer polled by workers while capacity allows.
pub trait InflowSource: Send + Sync {
    /// Enqueue the next piece of work. Returns false once exhausted.
    fn pull(&self, scheduler: &Scheduler) -> bool;
}

/// Cooperative pause flag owned by one scheduler.
#[derive(Clone, Default)]
pub struct PauseSwitch {
    paused: Arc<AtomicBool>,
}

impl PauseSwitch {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

pub struct Scheduler {
    queue: PriorityQueue<Box<dyn InflowJob>>,
    capacity: CapacityControl,
    pause: PauseSwitch,
    sources: Mutex<Vec<Arc<dyn InflowSource>>>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new(capacity_ceiling: usize) -> Self {
        Scheduler {
            queue: PriorityQueue::new(),
            capacity: CapacityControl::new(capacity_ceiling),
            pause: PauseSwitch::default(),
            sources: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Charge the job's cost and queue it. A closed scheduler drops the job.
    pub fn enqueue(&self, job: Box<dyn InflowJob>, priority: Priority) -> Result<()> {
        let cost = job.cost();
        self.capacity.increment(cost);
        if let Err(job) = self.queue.enqueue(job, priority) {
            self.capacity.decrement(cost);
            return Err(Error::invalid_state(format!("scheduler closed, {} dropped", job.name())));
        }
        Ok(())
    }

    pub fn add_source(&self, source: Arc<dyn InflowSource>) {
        self.sources.lock().push(source);
    }

    /// Let sources enqueue work while under the capacity ceiling.
    pub fn check_capacity(&self) -> bool {
        self.capacity.check_capacity(|| {
            let mut sources = self.sources.lock();
            sources.retain(|source| source.pull(self));
        })
    }

    pub fn pause_switch(&self) -> PauseSwitch {
        self.pause.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.in_flight()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Remove queued jobs without running them, releasing their capacity.
    pub(crate) fn take_queued(&self) -> Vec<Box<dyn InflowJob>> {
        let jobs = self.queue.drain();
        for job in &jobs {
            self.capacity.decrement(job.cost());
        }
        jobs
    }

    /// Refuse new work and drop whatever is still queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.queue.close();
        self.sources.lock().clear();
        for job in self.queue.drain() {
            tracing::debug!(job = job.name(), "dropping queued job on shutdown");
            self.capacity.decrement(job.cost());
        }
    }

    fn run(&self, job: Box<dyn InflowJob>) {
        let cost = job.cost();
        let name = job.name().to_string();
        match catch_unwind(AssertUnwindSafe(|| job.execute(self))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(job = %name, error = %e, "inflow job failed"),
            Err(_) => tracing::error!(job = %name, "inflow job panicked"),
        }
        self.capacity.decrement(cost);
    }
}

/// Fixed set of worker threads draining one scheduler.
pub struct WorkerPool {
    scheduler: Arc<Scheduler>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(scheduler: Arc<Scheduler>, threads: usize, poll_interval: Duration) -> Result<Self> {
        let mut handles = Vec::with_capacity(threads);
        for id in 0..threads.max(1) {
            let scheduler = scheduler.clone();
            let handle = thread::Builder::new()
                .name(format!("inflow-worker-{}", id))
                .spawn(move || worker_loop(id, &scheduler, poll_interval))?;
            handles.push(handle);
        }
        Ok(WorkerPool { scheduler, handles })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.scheduler.close();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("inflow worker exited by panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, scheduler: &Scheduler, poll_interval: Duration) {
    tracing::debug!(worker = id, "inflow worker started");
    loop {
        if scheduler.is_closed() {
            break;
        }
        if scheduler.pause.is_paused() {
            thread::sleep(poll_interval);
            continue;
        }
        scheduler.check_capacity();
        match scheduler.queue.dequeue_timeout(poll_interval) {
            Dequeued::Item(job) => scheduler.run(job),
            Dequeued::Timeout => {}
            Dequeued::Closed => break,
        }
    }
    tracing::debug!(worker = id, "inflow worker stopped");
}
