pub mod jobs;
pub mod json_writer;
