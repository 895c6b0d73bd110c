//! Per-connection command loop

use crate::config::ConnectionSettings;
use crate::protocol::{evaluate, is_exit_directive, ProtocolError, FAREWELL};
use crate::server::registry::Registration;
use crate::server::{ShutdownSignal, TaskLog};
use crate::types::TaskLogEntry;
use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::{debug, info};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The peer closed its end
    PeerClosed,
    /// The peer sent `exit` or `quit`
    Exit,
    /// No data arrived within the idle timeout
    IdleTimeout,
    /// The shutdown signal was observed
    Shutdown,
    /// Reading from the socket failed
    ReadError(String),
    /// Input was not valid UTF-8
    InvalidInput(String),
    /// Writing a reply failed
    WriteFailed(String),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::PeerClosed => write!(f, "peer closed"),
            Termination::Exit => write!(f, "client exit"),
            Termination::IdleTimeout => write!(f, "idle timeout"),
            Termination::Shutdown => write!(f, "server shutdown"),
            Termination::ReadError(e) => write!(f, "read error: {}", e),
            Termination::InvalidInput(e) => write!(f, "invalid input: {}", e),
            Termination::WriteFailed(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// Serves one accepted client until it leaves, idles out, fails, or the
/// server shuts down.
///
/// The handler owns the socket and the peer's [`Registration`], so both are
/// released on every exit path when it finishes.
pub struct ConnectionHandler<S = TcpStream> {
    stream: S,
    registration: Registration,
    task_log: Arc<TaskLog>,
    shutdown: ShutdownSignal,
    settings: ConnectionSettings,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a handler for an accepted stream
    pub fn new(
        stream: S,
        registration: Registration,
        task_log: Arc<TaskLog>,
        shutdown: ShutdownSignal,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            stream,
            registration,
            task_log,
            shutdown,
            settings,
        }
    }

    /// Run the command loop to completion
    pub async fn run(mut self) -> Termination {
        let port = self.registration.port();
        let peer = self.registration.peer().to_string();
        info!("[Port {}] Connected: {}", port, peer);

        let termination = self.serve().await;

        // Releases the socket and the registry entry.
        drop(self);
        info!("[Port {}] Disconnected: {} ({})", port, peer, termination);
        termination
    }

    async fn serve(&mut self) -> Termination {
        let mut codec = LinesCodec::new_with_max_length(self.settings.max_line_length);
        let mut buffer = BytesMut::with_capacity(self.settings.read_buffer_size);
        let idle_timeout = self.settings.idle_timeout();

        loop {
            buffer.reserve(self.settings.read_buffer_size);
            let read = tokio::select! {
                _ = self.shutdown.triggered() => return Termination::Shutdown,
                read = timeout(idle_timeout, self.stream.read_buf(&mut buffer)) => read,
            };

            match read {
                Err(_) => return Termination::IdleTimeout,
                Ok(Err(e)) => return Termination::ReadError(e.to_string()),
                Ok(Ok(0)) => {
                    let outcome = self.process_batch(&mut codec, &mut buffer, true).await;
                    return outcome.unwrap_or(Termination::PeerClosed);
                }
                Ok(Ok(_)) => {
                    if let Some(termination) = self.process_batch(&mut codec, &mut buffer, false).await {
                        return termination;
                    }
                }
            }
        }
    }

    /// Evaluate every complete line in `buffer` and send the replies as one
    /// write. Returns `Some` when the connection must end.
    async fn process_batch(
        &mut self,
        codec: &mut LinesCodec,
        buffer: &mut BytesMut,
        at_eof: bool,
    ) -> Option<Termination> {
        let mut responses = Vec::new();
        let mut outcome = None;

        loop {
            let frame = if at_eof {
                codec.decode_eof(buffer)
            } else {
                codec.decode(buffer)
            };

            let line = match frame {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    responses.push(ProtocolError::LineTooLong.to_reply());
                    continue;
                }
                Err(LinesCodecError::Io(e)) => {
                    outcome = Some(Termination::InvalidInput(e.to_string()));
                    break;
                }
            };

            if line.is_empty() {
                continue;
            }

            let command = line.trim();
            if is_exit_directive(command) {
                self.record(command, FAREWELL);
                responses.push(FAREWELL.to_string());
                outcome = Some(Termination::Exit);
                break;
            }

            let reply = evaluate(command);
            debug!(
                "[Port {}] {} -> {:?} => {:?}",
                self.registration.port(),
                self.registration.peer(),
                command,
                reply
            );
            self.record(command, &reply);
            responses.push(reply);
        }

        if !responses.is_empty() {
            let mut payload = responses.join("\n");
            payload.push('\n');
            if let Err(e) = self.stream.write_all(payload.as_bytes()).await {
                return Some(outcome.unwrap_or(Termination::WriteFailed(e.to_string())));
            }
        }

        outcome
    }

    fn record(&self, command: &str, result: &str) {
        self.task_log.record(TaskLogEntry::new(
            self.registration.port(),
            self.registration.peer(),
            command,
            result,
        ));
    }
}
