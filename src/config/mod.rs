//! Configuration management for cmdhub

pub mod settings;

pub use settings::{
    AdminSettings, ClientConfig, ConnectionSettings, LoggingSettings, ServerConfig,
    ServerSettings, TaskLogSettings, ENV_PREFIX,
};
