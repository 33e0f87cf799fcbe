use std::collections::VecDeque;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Highest,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Highest, Priority::High, Priority::Medium, Priority::Low];

    fn index(self) -> usize {
        self as usize
    }
}

pub enum Dequeued<T> {
    Item(T),
    Timeout,
    Closed,
}

struct QueueState<T> {
    levels: [VecDeque<T>; 4],
    closed: bool,
}

impl<T> QueueState<T> {
    fn pop(&mut self) -> Option<T> {
        self.levels.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Strict-priority queue, FIFO within a level, shared by producers and workers.
pub struct PriorityQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        PriorityQueue {
            state: Mutex::new(QueueState {
                levels: Default::default(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Returns the item back when the queue is closed.
    pub fn enqueue(&self, item: T, priority: Priority) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(item);
        }
        state.levels[priority.index()].push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until an item is available. `None` once closed and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.pop() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeued<T> {
        let mut state = self.state.lock();
        if let Some(item) = state.pop() {
            return Dequeued::Item(item);
        }
        if state.closed {
            return Dequeued::Closed;
        }
        self.available.wait_for(&mut state, timeout);
        match state.pop() {
            Some(item) => Dequeued::Item(item),
            None if state.closed => Dequeued::Closed,
            None => Dequeued::Timeout,
        }
    }

    /// Stop accepting items and wake every waiter. Queued items still drain.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    /// Remove and return everything still queued, highest priority first.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let mut items = Vec::new();
        while let Some(item) = state.pop() {
            items.push(item);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.state.lock().levels.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        PriorityQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn strict_priority_then_fifo() {
        let queue = PriorityQueue::new();
        queue.enqueue("low", Priority::Low).unwrap();
        queue.enqueue("high-1", Priority::High).unwrap();
        queue.enqueue("commit", Priority::Highest).unwrap();
        queue.enqueue("high-2", Priority::High).unwrap();
        queue.enqueue("medium", Priority::Medium).unwrap();

        let order: Vec<_> = (0..5).filter_map(|_| queue.dequeue()).collect();
        assert_eq!(order, vec!["commit", "high-1", "high-2", "medium", "low"]);
    }

    #[test]
    fn blocked_consumer_wakes_on_enqueue() {
        let queue = Arc::new(PriorityQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue())
        };
        queue.enqueue(7, Priority::Medium).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn close_releases_waiters_and_refuses_items() {
        let queue: Arc<PriorityQueue<u32>> = Arc::new(PriorityQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue())
        };
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
        assert_eq!(queue.enqueue(1, Priority::High), Err(1));
        assert!(matches!(queue.dequeue_timeout(Duration::from_millis(1)), Dequeued::Closed));
    }

    #[test]
    fn timeout_reports_empty_queue() {
        let queue: PriorityQueue<u32> = PriorityQueue::new();
        assert!(matches!(queue.dequeue_timeout(Duration::from_millis(5)), Dequeued::Timeout));
    }
}
