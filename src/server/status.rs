//! Listener lifecycle states and the table the console reads them from

use dashmap::DashMap;
use std::fmt;
use std::net::SocketAddr;

/// Lifecycle of one port listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    /// Binding the socket
    Starting,
    /// Accepting connections
    Listening,
    /// Shutdown observed, no longer accepting
    Draining,
    /// Socket closed
    Stopped,
    /// Bind failed; the listener never started
    Failed(String),
}

impl ListenerState {
    /// Whether the listener has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListenerState::Stopped | ListenerState::Failed(_))
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Starting => write!(f, "starting"),
            ListenerState::Listening => write!(f, "listening"),
            ListenerState::Draining => write!(f, "draining"),
            ListenerState::Stopped => write!(f, "stopped"),
            ListenerState::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// What the status table knows about one listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatus {
    /// Port requested in the configuration
    pub port: u16,
    /// Current lifecycle state
    pub state: ListenerState,
    /// Address actually bound, once known
    pub local_addr: Option<SocketAddr>,
    /// Connection handlers spawned by this listener that are still running
    pub active_connections: usize,
}

/// Concurrent table of listener statuses keyed by configured port
#[derive(Debug, Default)]
pub struct ListenerStatusTable {
    listeners: DashMap<u16, ListenerStatus>,
}

impl ListenerStatusTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state for `port`, creating the row if needed
    pub fn set_state(&self, port: u16, state: ListenerState) {
        let mut status = self.listeners.entry(port).or_insert_with(|| ListenerStatus {
            port,
            state: ListenerState::Starting,
            local_addr: None,
            active_connections: 0,
        });
        status.state = state;
    }

    /// Record the bound address for `port`
    pub fn set_local_addr(&self, port: u16, addr: SocketAddr) {
        if let Some(mut status) = self.listeners.get_mut(&port) {
            status.local_addr = Some(addr);
        }
    }

    /// Record how many handlers `port` still has running
    pub fn set_active_connections(&self, port: u16, count: usize) {
        if let Some(mut status) = self.listeners.get_mut(&port) {
            status.active_connections = count;
        }
    }

    /// Status of one listener
    pub fn get(&self, port: u16) -> Option<ListenerStatus> {
        self.listeners.get(&port).map(|status| status.clone())
    }

    /// Every listener, ordered by port
    pub fn snapshot(&self) -> Vec<ListenerStatus> {
        let mut statuses: Vec<_> = self
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        statuses.sort_by_key(|status| status.port);
        statuses
    }
}
