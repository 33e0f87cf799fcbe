use std::cell::Cell;
use parking_lot::ReentrantMutex;

/// Ceiling on in-flight cost units. The lock is re-entrant so the capacity
/// callback may enqueue work, which increments the counter again.
pub struct CapacityControl {
    ceiling: usize,
    in_flight: ReentrantMutex<Cell<usize>>,
}

impl CapacityControl {
    pub fn new(ceiling: usize) -> Self {
        CapacityControl {
            ceiling,
            in_flight: ReentrantMutex::new(Cell::new(0)),
        }
    }

    pub fn increment(&self, cost: usize) {
        let guard = self.in_flight.lock();
        guard.set(guard.get() + cost);
    }

    pub fn decrement(&self, cost: usize) {
        let guard = self.in_flight.lock();
        guard.set(guard.get().saturating_sub(cost));
    }

    /// Run `on_capacity` under the lock when below the ceiling. Returns
    /// whether it ran; declining is not an error.
    pub fn check_capacity<F: FnOnce()>(&self, on_capacity: F) -> bool {
        let guard = self.in_flight.lock();
        if guard.get() < self.ceiling {
            on_capacity();
            true
        } else {
            false
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().get()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn callback_can_reenter() {
        let control = CapacityControl::new(2);
        assert!(control.check_capacity(|| control.increment(1)));
        assert!(control.check_capacity(|| control.increment(1)));
        assert!(!control.check_capacity(|| control.increment(1)));
        control.decrement(5);
        assert_eq!(control.in_flight(), 0);
    }

    #[test]
    fn concurrent_checks_never_exceed_the_ceiling() {
        let control = Arc::new(CapacityControl::new(20));
        let invoked = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let control = control.clone();
                let invoked = invoked.clone();
                thread::spawn(move || {
                    control.check_capacity(|| {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        control.increment(1);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(invoked.load(Ordering::SeqCst), 20);
        assert_eq!(control.in_flight(), 20);
    }
}
