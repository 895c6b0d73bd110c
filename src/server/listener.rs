//! One listening socket and its accept loop

use crate::config::{ConnectionSettings, ServerConfig};
use crate::server::connection::ConnectionHandler;
use crate::server::status::ListenerState;
use crate::server::SharedState;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Accepts connections on one port and spawns a [`ConnectionHandler`] per
/// client.
///
/// Moves through `Starting -> Listening -> Draining -> Stopped`, or ends in
/// `Failed` when the port cannot be bound. A failure here never affects
/// listeners on other ports.
pub struct PortListener {
    host: String,
    port: u16,
    accept_poll: Duration,
    connection: ConnectionSettings,
    state: SharedState,
}

impl PortListener {
    /// Create a listener for `port` using the shared server state
    pub fn new(config: &ServerConfig, port: u16, state: SharedState) -> Self {
        Self {
            host: config.server.host.clone(),
            port,
            accept_poll: config.server.accept_poll(),
            connection: config.connection.clone(),
            state,
        }
    }

    /// Configured port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until shutdown. Returns the terminal state.
    pub async fn run(self) -> ListenerState {
        self.set_state(ListenerState::Starting);

        let listener = match TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("[Port {}] bind error: {}", self.port, e);
                let state = ListenerState::Failed(e.to_string());
                self.set_state(state.clone());
                return state;
            }
        };

        self.serve(listener).await
    }

    /// Serve an already-bound socket until shutdown
    pub async fn serve(self, listener: TcpListener) -> ListenerState {
        // Registry entries use the port actually bound, which differs from
        // the configured one when binding to port 0.
        let bound_port = match listener.local_addr() {
            Ok(addr) => {
                self.state.listeners.set_local_addr(self.port, addr);
                info!("[Port {}] Server listening on {}", self.port, addr);
                addr.port()
            }
            Err(_) => self.port,
        };
        self.set_state(ListenerState::Listening);

        let tracker = TaskTracker::new();
        let shutdown = self.state.shutdown.clone();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.triggered() => break,
                accepted = timeout(self.accept_poll, listener.accept()) => accepted,
            };

            match accepted {
                // Poll interval elapsed without a client.
                Err(_) => {}
                Ok(Ok((stream, addr))) => {
                    let registration = self.state.registry.register(bound_port, addr.to_string());
                    let handler = ConnectionHandler::new(
                        stream,
                        registration,
                        self.state.task_log.clone(),
                        shutdown.clone(),
                        self.connection.clone(),
                    );
                    tracker.spawn(handler.run());
                }
                Ok(Err(e)) => {
                    warn!("[Port {}] Failed to accept connection: {}", self.port, e);
                }
            }
            self.state.listeners.set_active_connections(self.port, tracker.len());
        }

        self.set_state(ListenerState::Draining);
        drop(listener);
        tracker.close();

        let remaining = tracker.len();
        self.state.listeners.set_active_connections(self.port, remaining);
        self.set_state(ListenerState::Stopped);
        info!(
            "[Port {}] Server stopped ({} connection handlers winding down)",
            self.port, remaining
        );
        ListenerState::Stopped
    }

    fn set_state(&self, state: ListenerState) {
        self.state.listeners.set_state(self.port, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::sleep;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.accept_poll_ms = 50;
        config
    }

    async fn wait_for_peers(state: &SharedState, port: u16, count: usize) {
        for _ in 0..100 {
            let current = state.registry.snapshot().get(&port).map_or(0, |p| p.len());
            if current == count {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {} peers on port {}", count, port);
    }

    #[tokio::test]
    async fn test_bind_failure_is_local() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let state = SharedState::new(10);
        let listener = PortListener::new(&test_config(), port, state.clone());
        let result = timeout(Duration::from_secs(2), listener.run()).await.unwrap();

        assert!(matches!(result, ListenerState::Failed(_)));
        assert!(matches!(
            state.listeners.get(port).unwrap().state,
            ListenerState::Failed(_)
        ));
        assert!(!state.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_accepts_and_registers_clients() {
        let state = SharedState::new(10);
        let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let listener = PortListener::new(&test_config(), port, state.clone());
        let handle = tokio::spawn(listener.serve(socket));

        let mut first = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let second = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        wait_for_peers(&state, port, 2).await;
        assert_eq!(
            state.listeners.get(port).unwrap().state,
            ListenerState::Listening
        );

        first.write_all(b"add 1 2\n").await.unwrap();
        let mut reader = BufReader::new(first);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "RESULT: 3\n");

        drop(second);
        wait_for_peers(&state, port, 1).await;

        state.shutdown.trigger();
        let result = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(result, ListenerState::Stopped);
        wait_for_peers(&state, port, 0).await;
    }

    #[tokio::test]
    async fn test_shutdown_before_any_client() {
        let state = SharedState::new(10);
        let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let listener = PortListener::new(&test_config(), port, state.clone());
        assert_eq!(listener.port(), port);
        let handle = tokio::spawn(listener.serve(socket));

        sleep(Duration::from_millis(100)).await;
        state.shutdown.trigger();

        let result = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(result, ListenerState::Stopped);
        assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    }
}
