//! cmdhub client implementation

pub mod command_client;

pub use command_client::CommandClient;
