pub mod capacity;
pub mod queue;
pub mod slot;
pub mod scheduler;
pub mod source;
