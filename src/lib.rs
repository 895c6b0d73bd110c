//! # cmdhub - Multi-Port TCP Command Server
//!
//! cmdhub listens on several TCP ports at once, evaluates newline-delimited
//! text commands from any number of clients, keeps live bookkeeping of who is
//! connected where, and records a bounded history of every executed command.
//! An operator console running next to the listeners can inspect that state
//! and coordinate a graceful shutdown.
//!
//! ## Features
//!
//! - **Multiple Ports**: One independent listener per configured port
//! - **Small Grammar**: Arithmetic (`add`, `sub`, `mul`, `div`) and `analyze`
//! - **Live Bookkeeping**: Connected peers per port and a bounded task log
//! - **Operator Console**: `clients`, `logs [n]`, `clearlogs`, `status`, `exit`
//! - **Cooperative Shutdown**: One cancellation token observed by every worker
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use cmdhub::config::ServerConfig;
//! use cmdhub::server::ServerManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_file("config/server.toml")?;
//!     let manager = ServerManager::new(config)?;
//!     manager.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use cmdhub::client::CommandClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CommandClient::connect("127.0.0.1", 5000).await?;
//!     let reply = client.request("add 2 3").await?;
//!     assert_eq!(reply, "RESULT: 5");
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod admin;
pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod types;

/// Common error types used throughout cmdhub
pub mod error {
    use std::fmt;

    /// cmdhub error types
    #[derive(Debug)]
    pub enum CmdHubError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Serialization/deserialization failed
        Serde(serde_json::Error),
        /// Configuration error
        Config(String),
        /// Client error
        Client(String),
        /// Connection error
        Connection(String),
    }

    impl fmt::Display for CmdHubError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CmdHubError::Io(e) => write!(f, "I/O error: {}", e),
                CmdHubError::Serde(e) => write!(f, "Serialization error: {}", e),
                CmdHubError::Config(e) => write!(f, "Configuration error: {}", e),
                CmdHubError::Client(e) => write!(f, "Client error: {}", e),
                CmdHubError::Connection(e) => write!(f, "Connection error: {}", e),
            }
        }
    }

    impl std::error::Error for CmdHubError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                CmdHubError::Io(e) => Some(e),
                CmdHubError::Serde(e) => Some(e),
                _ => None,
            }
        }
    }

    impl From<std::io::Error> for CmdHubError {
        fn from(err: std::io::Error) -> Self {
            CmdHubError::Io(err)
        }
    }

    impl From<serde_json::Error> for CmdHubError {
        fn from(err: serde_json::Error) -> Self {
            CmdHubError::Serde(err)
        }
    }

    impl From<::config::ConfigError> for CmdHubError {
        fn from(err: ::config::ConfigError) -> Self {
            CmdHubError::Config(err.to_string())
        }
    }

    /// Result type alias for cmdhub operations
    pub type Result<T> = std::result::Result<T, CmdHubError>;
}

pub use error::{CmdHubError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::admin::AdminConsole;
    pub use crate::client::CommandClient;
    pub use crate::config::{ClientConfig, ServerConfig};
    pub use crate::protocol::{evaluate, ProtocolError, Request};
    pub use crate::server::{ClientRegistry, ServerManager, ShutdownSignal, TaskLog};
    pub use crate::types::TaskLogEntry;
    pub use crate::{CmdHubError, Result};
}
