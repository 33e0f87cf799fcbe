use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;

// Slot keys sort so that every child precedes its parent and earlier
// siblings precede later ones: root `[seq, MAX]`, child `[..prefix, i, MAX]`.
type SlotKey = Vec<u64>;

enum SlotState<T> {
    Pending,
    Ready(T),
    Abandoned,
}

struct ChainState<T> {
    slots: BTreeMap<SlotKey, SlotState<T>>,
    next_root: u64,
    draining: bool,
}

struct ChainInner<T> {
    state: Mutex<ChainState<T>>,
    sink: Mutex<Box<dyn FnMut(T) + Send>>,
}

/// Ordered completion chain. Values handed to `Slot::ready` reach the sink
/// in reservation order, however the slots complete.
pub struct SlotChain<T> {
    inner: Arc<ChainInner<T>>,
}

impl<T: Send + 'static> SlotChain<T> {
    pub fn new<F>(sink: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        SlotChain {
            inner: Arc::new(ChainInner {
                state: Mutex::new(ChainState {
                    slots: BTreeMap::new(),
                    next_root: 0,
                    draining: false,
                }),
                sink: Mutex::new(Box::new(sink)),
            }),
        }
    }

    pub fn reserve(&self) -> Slot<T> {
        let mut state = self.inner.state.lock();
        let key = vec![state.next_root, u64::MAX];
        state.next_root += 1;
        state.slots.insert(key.clone(), SlotState::Pending);
        Slot::new(self.inner.clone(), key)
    }

    /// Slots reserved but not yet delivered.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().slots.len()
    }
}

impl<T> Clone for SlotChain<T> {
    fn clone(&self) -> Self {
        SlotChain { inner: self.inner.clone() }
    }
}

/// One ordered position in a chain. Dropping it without `ready` abandons it
/// so later slots are not held back.
pub struct Slot<T: Send + 'static> {
    chain: Arc<ChainInner<T>>,
    key: SlotKey,
    children: AtomicU64,
    completed: bool,
}

impl<T: Send + 'static> Slot<T> {
    fn new(chain: Arc<ChainInner<T>>, key: SlotKey) -> Self {
        Slot { chain, key, children: AtomicU64::new(0), completed: false }
    }

    /// Child slot delivered after the children split before it and before
    /// this slot itself.
    pub fn split(&self) -> Slot<T> {
        let index = self.children.fetch_add(1, Ordering::SeqCst);
        let mut key = self.key[..self.key.len() - 1].to_vec();
        key.push(index);
        key.push(u64::MAX);
        self.chain.state.lock().slots.insert(key.clone(), SlotState::Pending);
        Slot::new(self.chain.clone(), key)
    }

    pub fn ready(mut self, value: T) {
        self.completed = true;
        self.complete(SlotState::Ready(value));
    }

    fn complete(&self, outcome: SlotState<T>) {
        {
            let mut state = self.chain.state.lock();
            state.slots.insert(self.key.clone(), outcome);
            if state.draining {
                return;
            }
            state.draining = true;
        }
        self.drain();
    }

    // Only one thread drains at a time; it rechecks under the lock before
    // giving up the role, so no completion is left behind. A panicking sink
    // loses its value but must not end the drain with `draining` still set.
    fn drain(&self) {
        loop {
            let values = {
                let mut state = self.chain.state.lock();
                let mut values = Vec::new();
                while let Some(entry) = state.slots.first_entry() {
                    if matches!(entry.get(), SlotState::Pending) {
                        break;
                    }
                    match entry.remove_entry() {
                        (_, SlotState::Ready(value)) => values.push(value),
                        (key, _) => tracing::warn!(slot = ?key, "slot abandoned without a value"),
                    }
                }
                if values.is_empty() {
                    state.draining = false;
                    return;
                }
                values
            };

            let mut sink = self.chain.sink.lock();
            for value in values {
                if catch_unwind(AssertUnwindSafe(|| (*sink)(value))).is_err() {
                    tracing::error!("slot sink panicked; value dropped");
                }
            }
        }
    }
}

impl<T: Send + 'static> Drop for Slot<T> {
    fn drop(&mut self) {
        if !self.completed {
            self.completed = true;
            self.complete(SlotState::Abandoned);
        }
    }
}
