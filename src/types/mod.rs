//! Shared data types

pub mod task_entry;

pub use task_entry::TaskLogEntry;
