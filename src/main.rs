//! cmdhub Server Binary
//!
//! Multi-port TCP command server with an operator console.

use clap::Parser;
use cmdhub::config::ServerConfig;
use cmdhub::server::ServerManager;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How long the runtime waits for blocked workers (e.g. a parked stdin read)
/// once the manager has returned
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "cmdhub-server")]
#[command(about = "Multi-port TCP command server with an operator console")]
#[command(version)]
struct Args {
    /// Ports to listen on (default: 5000 5001)
    ports: Vec<u16>,

    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Host address to bind every listener to
    #[arg(long)]
    host: Option<String>,

    /// Seconds of client inactivity before a connection is closed
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Number of task log entries to retain
    #[arg(long)]
    log_capacity: Option<usize>,

    /// Run without the operator console
    #[arg(long)]
    headless: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config_exists = args.config.exists();
    let mut config = ServerConfig::load(config_exists.then_some(args.config.as_path()))?;

    // Override config with CLI arguments
    if !args.ports.is_empty() {
        config.server.ports = args.ports.clone();
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(idle_timeout) = args.idle_timeout {
        config.connection.idle_timeout_secs = idle_timeout;
    }
    if let Some(capacity) = args.log_capacity {
        config.task_log.capacity = capacity;
    }
    if args.headless {
        config.admin.enabled = false;
    }

    // Initialize tracing; stdout belongs to the operator console
    let filter = if args.verbose {
        EnvFilter::new("cmdhub=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cmdhub server v{}", env!("CARGO_PKG_VERSION"));
    if !config_exists {
        info!("Config file not found, using defaults");
    }

    config.validate()?;
    info!("Host: {}", config.server.host);
    info!("Ports: {:?}", config.server.ports);
    info!("Idle timeout: {}s", config.connection.idle_timeout_secs);
    info!("Task log capacity: {}", config.task_log.capacity);

    let manager = ServerManager::new(config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(manager.run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result?;

    info!("cmdhub server stopped");
    Ok(())
}
