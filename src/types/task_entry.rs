//! Task log entry types and utilities

use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable record of one evaluated command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    /// Unique identifier for this entry
    pub id: Uuid,

    /// When the command finished evaluating
    pub timestamp: DateTime<Local>,

    /// Local port the command arrived on
    pub port: u16,

    /// Peer identifier (`host:port` of the remote end)
    pub peer: String,

    /// Command text as received, trimmed
    pub command: String,

    /// First line of the response sent back
    pub result: String,
}

impl TaskLogEntry {
    /// Create a new entry stamped with the current time.
    ///
    /// Only the first line of `result` is kept, so multi-line replies such as
    /// an analysis block are summarized by their header.
    pub fn new(port: u16, peer: impl Into<String>, command: impl Into<String>, result: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            port,
            peer: peer.into(),
            command: command.into(),
            result: result.lines().next().unwrap_or_default().to_string(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an entry back from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Format as the line shown by the operator console
    pub fn to_human_readable(&self) -> String {
        let timestamp = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        format!(
            "[{}] Port {} | {} | {} -> {}",
            timestamp, self.port, self.peer, self.command, self.result
        )
    }
}
