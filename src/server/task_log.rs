//! Bounded history of executed commands

use crate::types::TaskLogEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default number of entries retained
pub const DEFAULT_CAPACITY: usize = 1000;

/// Thread-safe ring buffer of [`TaskLogEntry`] records in completion order.
///
/// Once `capacity` entries are held, each new record evicts the oldest.
#[derive(Debug)]
pub struct TaskLog {
    capacity: usize,
    entries: Mutex<VecDeque<TaskLogEntry>>,
}

impl Default for TaskLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TaskLog {
    /// Create an empty log holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn record(&self, entry: TaskLogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the most recent `limit` entries, oldest first, or of every
    /// entry when `limit` is `None`
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<TaskLogEntry> {
        let entries = self.entries.lock();
        let skip = match limit {
            Some(limit) => entries.len().saturating_sub(limit),
            None => 0,
        };
        entries.iter().skip(skip).cloned().collect()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of entries retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
