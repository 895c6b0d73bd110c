//! cmdhub Interactive Client
//!
//! Reads commands from stdin, sends each to the server and prints the reply.

use clap::Parser;
use cmdhub::client::CommandClient;
use cmdhub::config::ClientConfig;
use cmdhub::protocol::is_exit_directive;
use cmdhub::CmdHubError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cmdhub-client")]
#[command(about = "Interactive client for a cmdhub server")]
#[command(version)]
struct Args {
    /// Server host
    host: String,

    /// Server port
    port: u16,

    /// Connect and reply timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig {
        host: args.host.clone(),
        port: args.port,
        timeout_seconds: args.timeout,
        auto_reconnect: false,
    };
    let client = CommandClient::with_config(config).await?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "Connected to {}:{}\nType commands (add, sub, mul, div, analyze). Type 'quit' to exit.\n",
                args.host, args.port
            )
            .as_bytes(),
        )
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        match client.request(command).await {
            Ok(reply) => {
                stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
            }
            Err(CmdHubError::Connection(e)) => {
                error!("{}", e);
                stdout.write_all(b"Connection lost.\n").await?;
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if is_exit_directive(command) {
            break;
        }
    }

    client.close().await?;
    stdout.write_all(b"Connection closed.\n").await?;
    Ok(())
}
