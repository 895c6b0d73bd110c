//! Client for sending commands to a cmdhub server

use crate::config::ClientConfig;
use crate::protocol::FAREWELL;
use crate::{CmdHubError, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// First line of a multi-line analysis reply
const ANALYSIS_HEADER: &str = "ANALYSIS:";

/// Lines that follow the analysis header
const ANALYSIS_BODY_LINES: usize = 4;

/// Async client speaking the line protocol.
///
/// Replies are framed by their shape: one line per command, or five when
/// the first line is the analysis header.
#[derive(Clone)]
pub struct CommandClient {
    config: ClientConfig,
    connection: Arc<Mutex<Option<BufReader<TcpStream>>>>,
}

impl CommandClient {
    /// Connect to `host:port` with default settings
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let config = ClientConfig {
            host: host.to_string(),
            port,
            ..Default::default()
        };

        Self::with_config(config).await
    }

    /// Connect using a custom configuration
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Self {
            config,
            connection: Arc::new(Mutex::new(None)),
        };

        let mut guard = client.connection.lock().await;
        *guard = Some(client.open().await?);
        drop(guard);

        Ok(client)
    }

    async fn open(&self) -> Result<BufReader<TcpStream>> {
        let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = timeout(self.config.timeout(), connect)
            .await
            .map_err(|_| CmdHubError::Connection("Connection timeout".to_string()))?
            .map_err(|e| CmdHubError::Connection(format!("Failed to connect: {}", e)))?;
        Ok(BufReader::new(stream))
    }

    /// Send one command and wait for its reply
    pub async fn request(&self, command: &str) -> Result<String> {
        self.batch(&[command])
            .await?
            .pop()
            .ok_or_else(|| CmdHubError::Client("Empty commands get no reply".to_string()))
    }

    /// Send several commands in a single write and collect one reply per
    /// command. Zero-length commands are sent but get no reply. Collection
    /// stops early at the farewell reply, after which the connection is
    /// closed.
    pub async fn batch<S: AsRef<str>>(&self, commands: &[S]) -> Result<Vec<String>> {
        if commands.iter().any(|c| c.as_ref().contains('\n')) {
            return Err(CmdHubError::Client("Commands must be single lines".to_string()));
        }

        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            if !self.config.auto_reconnect {
                return Err(CmdHubError::Connection("Not connected".to_string()));
            }
            *guard = Some(self.open().await?);
        }

        let Some(conn) = guard.as_mut() else {
            return Err(CmdHubError::Connection("Not connected".to_string()));
        };
        let exchanged = self.exchange(conn, commands).await;

        // A failed or finished exchange leaves the stream unusable.
        match &exchanged {
            Ok(replies) if replies.last().map(String::as_str) == Some(FAREWELL) => *guard = None,
            Err(_) => *guard = None,
            Ok(_) => {}
        }
        exchanged
    }

    async fn exchange<S: AsRef<str>>(
        &self,
        conn: &mut BufReader<TcpStream>,
        commands: &[S],
    ) -> Result<Vec<String>> {
        let payload: String = commands
            .iter()
            .map(|c| format!("{}\n", c.as_ref()))
            .collect();
        conn.get_mut().write_all(payload.as_bytes()).await?;

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            if command.as_ref().is_empty() {
                continue;
            }
            let reply = timeout(self.config.timeout(), read_reply(conn))
                .await
                .map_err(|_| CmdHubError::Connection("Timed out waiting for reply".to_string()))??;
            let done = reply == FAREWELL;
            replies.push(reply);
            if done {
                break;
            }
        }
        Ok(replies)
    }

    /// Whether the client currently holds an open connection
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Close the connection to the server
    pub async fn close(&self) -> Result<()> {
        let mut conn_guard = self.connection.lock().await;
        if let Some(mut conn) = conn_guard.take() {
            conn.get_mut().shutdown().await.map_err(CmdHubError::Io)?;
        }
        Ok(())
    }
}

async fn read_reply(conn: &mut BufReader<TcpStream>) -> Result<String> {
    let mut reply = read_line(conn).await?;
    if reply == ANALYSIS_HEADER {
        for _ in 0..ANALYSIS_BODY_LINES {
            reply.push('\n');
            reply.push_str(&read_line(conn).await?);
        }
    }
    Ok(reply)
}

async fn read_line(conn: &mut BufReader<TcpStream>) -> Result<String> {
    let mut line = String::new();
    if conn.read_line(&mut line).await? == 0 {
        return Err(CmdHubError::Connection("Server closed connection".to_string()));
    }
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}
