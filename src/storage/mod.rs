pub mod directory;
pub mod file_lock;
pub mod segment;
pub mod snapshot;
