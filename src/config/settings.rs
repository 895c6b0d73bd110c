//! Configuration structures for cmdhub

use crate::{CmdHubError, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `CMDHUB__SERVER__HOST`
pub const ENV_PREFIX: &str = "CMDHUB";

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Per-connection settings
    pub connection: ConnectionSettings,
    /// Task log settings
    pub task_log: TaskLogSettings,
    /// Operator console settings
    pub admin: AdminSettings,
    /// Diagnostic logging settings
    pub logging: LoggingSettings,
}

/// Core listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host address every listener binds to
    pub host: String,
    /// Ports to listen on, one listener each
    pub ports: Vec<u16>,
    /// Upper bound on a single accept wait before the shutdown flag is re-checked
    pub accept_poll_ms: u64,
    /// Interval at which the manager polls the shutdown flag
    pub shutdown_poll_ms: u64,
}

/// Per-connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Seconds without incoming data before the server closes a connection
    pub idle_timeout_secs: u64,
    /// Size of each socket read
    pub read_buffer_size: usize,
    /// Longest accepted command line in bytes
    pub max_line_length: usize,
}

/// Task log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLogSettings {
    /// Number of entries kept before the oldest are evicted
    pub capacity: usize,
}

/// Operator console settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// Run the console on the controlling terminal
    pub enabled: bool,
}

/// Diagnostic logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host to connect to
    pub host: String,
    /// Server port to connect to
    pub port: u16,
    /// Connect and read timeout in seconds
    pub timeout_seconds: u64,
    /// Reconnect on the next request after `close`
    pub auto_reconnect: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ports: vec![5000, 5001],
            accept_poll_ms: 1000,
            shutdown_poll_ms: 1000,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            read_buffer_size: 4096,
            max_line_length: 8192,
        }
    }
}

impl Default for TaskLogSettings {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            timeout_seconds: 5,
            auto_reconnect: true,
        }
    }
}

impl ServerSettings {
    /// Accept wait bound as a `Duration`
    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    /// Shutdown poll interval as a `Duration`
    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }
}

impl ConnectionSettings {
    /// Idle timeout as a `Duration`
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CmdHubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| CmdHubError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration by layering defaults, an optional TOML file and
    /// `CMDHUB__<SECTION>__<KEY>` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.ports")
                .try_parsing(true),
        );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(CmdHubError::Config("Host cannot be empty".to_string()));
        }
        if self.server.ports.is_empty() {
            return Err(CmdHubError::Config("At least one port is required".to_string()));
        }
        let mut seen = BTreeSet::new();
        if let Some(port) = self.server.ports.iter().find(|port| !seen.insert(**port)) {
            return Err(CmdHubError::Config(format!("Port {} is listed more than once", port)));
        }
        if self.server.accept_poll_ms == 0 || self.server.shutdown_poll_ms == 0 {
            return Err(CmdHubError::Config("Poll intervals must be positive".to_string()));
        }
        if self.connection.idle_timeout_secs == 0 {
            return Err(CmdHubError::Config("Idle timeout must be positive".to_string()));
        }
        if self.connection.read_buffer_size == 0 || self.connection.max_line_length == 0 {
            return Err(CmdHubError::Config("Buffer sizes must be positive".to_string()));
        }
        if self.task_log.capacity == 0 {
            return Err(CmdHubError::Config("Task log capacity must be positive".to_string()));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CmdHubError::Config("Host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(CmdHubError::Config("Port cannot be zero".to_string()));
        }
        Ok(())
    }

    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.ports, vec![5000, 5001]);
        assert_eq!(config.connection.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.server.accept_poll(), Duration::from_secs(1));
        assert_eq!(config.task_log.capacity, 1000);
        assert!(config.admin.enabled);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nports = [7000, 7001, 7002]\n\n[task_log]\ncapacity = 5\n"
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.ports, vec![7000, 7001, 7002]);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.task_log.capacity, 5);
        assert_eq!(config.connection.idle_timeout_secs, 300);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nports = ").unwrap();

        match ServerConfig::from_file(file.path()) {
            Err(CmdHubError::Config(msg)) => assert!(msg.contains("parse")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_file_missing() {
        let result = ServerConfig::from_file("/nonexistent/cmdhub/server.toml");
        assert!(matches!(result, Err(CmdHubError::Config(_))));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.connection.max_line_length, 8192);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_reads_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nidle_timeout_secs = 42\n").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.connection.idle_timeout_secs, 42);
        assert_eq!(config.server.ports, vec![5000, 5001]);
    }

    #[test]
    fn test_validation_rejects_invalid_values() {
        let mut config = ServerConfig::default();
        config.server.ports.clear();
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.task_log.capacity = 0;
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.connection.idle_timeout_secs = 0;
        assert_err!(config.validate());

        let mut config = ServerConfig::default();
        config.server.host = "  ".to_string();
        assert_err!(config.validate());
    }

    #[test]
    fn test_validation_rejects_duplicate_ports() {
        let mut config = ServerConfig::default();
        config.server.ports = vec![5000, 5001, 5000];
        match config.validate() {
            Err(CmdHubError::Config(msg)) => assert!(msg.contains("5000")),
            other => panic!("Expected Config error, got {:?}", other),
        }

        config.server.ports = vec![0, 0];
        assert_err!(config.validate());

        config.server.ports = vec![0, 5000];
        assert_ok!(config.validate());
    }

    #[test]
    fn test_client_config_validation() {
        assert_ok!(ClientConfig::default().validate());

        let invalid = ClientConfig {
            host: String::new(),
            ..Default::default()
        };
        assert_err!(invalid.validate());

        let invalid = ClientConfig {
            port: 0,
            ..Default::default()
        };
        assert_err!(invalid.validate());
    }
}
