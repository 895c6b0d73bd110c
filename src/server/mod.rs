//! cmdhub server implementation

pub mod connection;
pub mod listener;
pub mod registry;
pub mod shutdown;
pub mod status;
pub mod task_log;

use crate::admin::AdminConsole;
use crate::config::ServerConfig;
use crate::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use connection::{ConnectionHandler, Termination};
pub use listener::PortListener;
pub use registry::{ClientRegistry, Registration, RegistrySnapshot};
pub use shutdown::ShutdownSignal;
pub use status::{ListenerState, ListenerStatus, ListenerStatusTable};
pub use task_log::TaskLog;

/// Handles to the state shared by every worker
#[derive(Debug, Clone)]
pub struct SharedState {
    /// Connected peers per port
    pub registry: Arc<ClientRegistry>,
    /// History of executed commands
    pub task_log: Arc<TaskLog>,
    /// Process-wide cancellation flag
    pub shutdown: ShutdownSignal,
    /// Lifecycle of each listener
    pub listeners: Arc<ListenerStatusTable>,
}

impl SharedState {
    /// Fresh state with a task log of the given capacity
    pub fn new(task_log_capacity: usize) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            task_log: Arc::new(TaskLog::new(task_log_capacity)),
            shutdown: ShutdownSignal::new(),
            listeners: Arc::new(ListenerStatusTable::new()),
        }
    }
}

/// Composition root: starts one listener per port plus the operator
/// console and returns once shutdown has been requested.
///
/// Workers are not joined on the way out; each observes the same
/// [`ShutdownSignal`] and winds down within its own polling bound.
pub struct ServerManager {
    config: ServerConfig,
    state: SharedState,
}

impl ServerManager {
    /// Create a manager with the given configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let state = SharedState::new(config.task_log.capacity);
        Ok(Self { config, state })
    }

    /// Shared state handles
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Connected peers per port
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// History of executed commands
    pub fn task_log(&self) -> Arc<TaskLog> {
        Arc::clone(&self.state.task_log)
    }

    /// The signal that stops the server when triggered
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.state.shutdown.clone()
    }

    /// Listener lifecycle table
    pub fn listeners(&self) -> Arc<ListenerStatusTable> {
        Arc::clone(&self.state.listeners)
    }

    /// Run with Ctrl+C handling and, unless disabled, the console on the
    /// controlling terminal
    pub async fn run(self) -> Result<()> {
        let interrupt = spawn_interrupt_listener(self.state.shutdown.clone());

        let result = if self.config.admin.enabled {
            let input = BufReader::new(tokio::io::stdin());
            self.run_with_console(input, tokio::io::stdout()).await
        } else {
            self.run_headless().await
        };

        interrupt.abort();
        result
    }

    /// Run with the console reading `input` and writing to `output`
    pub async fn run_with_console<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.start_listeners();

        let console = AdminConsole::new(self.state.clone());
        tokio::spawn(async move {
            if let Err(e) = console.run(input, output).await {
                warn!("Admin console stopped: {}", e);
            }
        });

        self.wait_for_shutdown().await;
        Ok(())
    }

    /// Run the listeners only
    pub async fn run_headless(self) -> Result<()> {
        self.start_listeners();
        self.wait_for_shutdown().await;
        Ok(())
    }

    fn start_listeners(&self) {
        for &port in &self.config.server.ports {
            let listener = PortListener::new(&self.config, port, self.state.clone());
            tokio::spawn(listener.run());
        }
        info!("Servers running on ports: {:?}", self.config.server.ports);
    }

    async fn wait_for_shutdown(self) {
        let poll = self.config.server.shutdown_poll();
        while !self.state.shutdown.await_trigger_or_timeout(poll).await {}
        info!("Shutdown complete.");
    }
}

/// Trigger `shutdown` on Ctrl+C
pub fn spawn_interrupt_listener(shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Keyboard interrupt received.");
                shutdown.trigger();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    })
}
