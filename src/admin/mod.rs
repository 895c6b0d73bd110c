//! Operator console for live introspection and shutdown

pub mod console;

pub use console::{AdminCommand, AdminConsole, BANNER};
