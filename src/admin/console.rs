//! Interactive operator console

use crate::server::{ClientRegistry, ListenerStatusTable, SharedState, ShutdownSignal, TaskLog};
use crate::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Printed when the console starts
pub const BANNER: &str = "Admin commands: clients | logs [n] | clearlogs | status | help | exit";

const LOGS_USAGE: &str = "Usage: logs [n]   (n must be an integer)";

const INVALID_INPUT: &str = "Invalid input: admin commands must be UTF-8 text";

const HELP: &str = "\
Admin commands:
  clients      list connected clients per port
  logs [n]     show the last n task log entries (all if n is omitted)
  clearlogs    clear the task log
  status       show listener states
  help         show this help
  exit | quit  shut the server down
";

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `clients`
    Clients,
    /// `logs [n]`
    Logs(Option<i64>),
    /// `logs` with an argument that is not an integer
    InvalidLogsArgument,
    /// `clearlogs`
    ClearLogs,
    /// `status`
    Status,
    /// `help`
    Help,
    /// `exit` or `quit`
    Exit,
    /// Anything else, lower-cased
    Unknown(String),
}

impl AdminCommand {
    /// Parse one line of operator input. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let cmd = raw.trim().to_lowercase();
        let mut parts = cmd.split_whitespace();
        let verb = parts.next()?;
        let args: Vec<&str> = parts.collect();

        let command = match (verb, args.as_slice()) {
            ("exit" | "quit", []) => AdminCommand::Exit,
            ("clients", []) => AdminCommand::Clients,
            ("clearlogs", []) => AdminCommand::ClearLogs,
            ("status", []) => AdminCommand::Status,
            ("help", []) => AdminCommand::Help,
            ("logs", []) => AdminCommand::Logs(None),
            ("logs", [n]) => match n.parse::<i64>() {
                Ok(n) => AdminCommand::Logs(Some(n)),
                Err(_) => AdminCommand::InvalidLogsArgument,
            },
            ("logs", _) => AdminCommand::InvalidLogsArgument,
            _ => AdminCommand::Unknown(cmd.clone()),
        };
        Some(command)
    }
}

/// Reads operator commands and reports on the shared server state.
///
/// The loop ends on end-of-input, on `exit`/`quit` (which also triggers
/// shutdown), or as soon as shutdown is triggered elsewhere. When reading
/// from a terminal the underlying blocking read may stay parked until the
/// next line or process exit; that thread is abandoned, not joined.
pub struct AdminConsole {
    registry: Arc<ClientRegistry>,
    task_log: Arc<TaskLog>,
    shutdown: ShutdownSignal,
    listeners: Arc<ListenerStatusTable>,
}

impl AdminConsole {
    /// Create a console over the shared server state
    pub fn new(state: SharedState) -> Self {
        Self {
            registry: state.registry,
            task_log: state.task_log,
            shutdown: state.shutdown,
            listeners: state.listeners,
        }
    }

    /// Run the read loop over `input`, writing replies to `output`.
    ///
    /// A line that is not valid UTF-8 is reported and skipped.
    pub async fn run<R, W>(self, mut input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(format!("{}\n", BANNER).as_bytes()).await?;
        output.flush().await?;

        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = tokio::select! {
                _ = self.shutdown.triggered() => break,
                read = input.read_until(b'\n', &mut raw) => read?,
            };
            if read == 0 {
                debug!("Admin console input closed");
                break;
            }

            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Admin console input rejected: {}", e);
                    output.write_all(format!("{}\n", INVALID_INPUT).as_bytes()).await?;
                    output.flush().await?;
                    continue;
                }
            };
            let Some(command) = AdminCommand::parse(line) else {
                continue;
            };

            let reply = self.execute(&command);
            output.write_all(reply.as_bytes()).await?;
            output.flush().await?;

            if command == AdminCommand::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command and return the text to show the operator
    pub fn execute(&self, command: &AdminCommand) -> String {
        match command {
            AdminCommand::Clients => self.render_clients(),
            AdminCommand::Logs(limit) => self.render_logs(*limit),
            AdminCommand::InvalidLogsArgument => format!("{}\n", LOGS_USAGE),
            AdminCommand::ClearLogs => {
                self.task_log.clear();
                "Logs cleared.\n".to_string()
            }
            AdminCommand::Status => self.render_status(),
            AdminCommand::Help => HELP.to_string(),
            AdminCommand::Exit => {
                info!("Admin requested shutdown.");
                self.shutdown.trigger();
                "Admin requested shutdown.\n".to_string()
            }
            AdminCommand::Unknown(cmd) => format!("Unknown admin command: {}\n", cmd),
        }
    }

    fn render_clients(&self) -> String {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return "No connected clients.\n".to_string();
        }

        let mut out = String::from("Connected clients:\n");
        for (port, peers) in &snapshot {
            let _ = writeln!(out, "  Port {}:", port);
            for peer in peers {
                let _ = writeln!(out, "    - {}", peer);
            }
        }
        out
    }

    fn render_logs(&self, limit: Option<i64>) -> String {
        let limit = limit.map(|n| usize::try_from(n).unwrap_or(0));
        let entries = self.task_log.snapshot(limit);
        if entries.is_empty() {
            return "No task logs.\n".to_string();
        }

        let mut out = format!("Showing last {} log entries:\n", entries.len());
        for entry in &entries {
            let _ = writeln!(out, "{}", entry.to_human_readable());
        }
        out
    }

    fn render_status(&self) -> String {
        let statuses = self.listeners.snapshot();
        if statuses.is_empty() {
            return "No listeners.\n".to_string();
        }

        let mut out = String::from("Listeners:\n");
        for status in &statuses {
            let _ = write!(out, "  Port {}: {}", status.port, status.state);
            if let Some(addr) = status.local_addr {
                let _ = write!(out, " on {}", addr);
            }
            let _ = writeln!(out, " ({} active connections)", status.active_connections);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ListenerState;
    use crate::types::TaskLogEntry;

    fn console() -> (AdminConsole, SharedState) {
        let state = SharedState::new(100);
        (AdminConsole::new(state.clone()), state)
    }

    async fn run_script(console: AdminConsole, script: &str) -> String {
        let mut output = Vec::new();
        console.run(script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(AdminCommand::parse("  "), None);
        assert_eq!(AdminCommand::parse("CLIENTS"), Some(AdminCommand::Clients));
        assert_eq!(AdminCommand::parse("logs"), Some(AdminCommand::Logs(None)));
        assert_eq!(AdminCommand::parse("logs 5"), Some(AdminCommand::Logs(Some(5))));
        assert_eq!(AdminCommand::parse("logs -2"), Some(AdminCommand::Logs(Some(-2))));
        assert_eq!(AdminCommand::parse("logs five"), Some(AdminCommand::InvalidLogsArgument));
        assert_eq!(AdminCommand::parse("logs 1 2"), Some(AdminCommand::InvalidLogsArgument));
        assert_eq!(AdminCommand::parse("Quit"), Some(AdminCommand::Exit));
        assert_eq!(
            AdminCommand::parse("Reboot Now"),
            Some(AdminCommand::Unknown("reboot now".to_string()))
        );
    }

    #[test]
    fn test_clients_listing_is_sorted() {
        let (console, state) = console();
        assert_eq!(console.execute(&AdminCommand::Clients), "No connected clients.\n");

        state.registry.add(5001, "10.0.0.9:1");
        state.registry.add(5000, "10.0.0.2:7");
        state.registry.add(5000, "10.0.0.1:9");

        assert_eq!(
            console.execute(&AdminCommand::Clients),
            "Connected clients:\n  Port 5000:\n    - 10.0.0.1:9\n    - 10.0.0.2:7\n  Port 5001:\n    - 10.0.0.9:1\n"
        );
    }

    #[test]
    fn test_logs_and_clearlogs() {
        let (console, state) = console();
        assert_eq!(console.execute(&AdminCommand::Logs(None)), "No task logs.\n");

        for i in 0..3 {
            state
                .task_log
                .record(TaskLogEntry::new(5000, "a:1", format!("add {} 1", i), "RESULT: 1"));
        }

        let all = console.execute(&AdminCommand::Logs(None));
        assert!(all.starts_with("Showing last 3 log entries:\n"));
        assert_eq!(all.lines().count(), 4);

        let last = console.execute(&AdminCommand::Logs(Some(1)));
        assert!(last.starts_with("Showing last 1 log entries:\n"));
        assert!(last.contains("Port 5000 | a:1 | add 2 1 -> RESULT: 1"));

        assert_eq!(console.execute(&AdminCommand::Logs(Some(0))), "No task logs.\n");
        assert_eq!(console.execute(&AdminCommand::Logs(Some(-4))), "No task logs.\n");

        assert_eq!(console.execute(&AdminCommand::ClearLogs), "Logs cleared.\n");
        assert!(state.task_log.is_empty());
    }

    #[test]
    fn test_status_listing() {
        let (console, state) = console();
        assert_eq!(console.execute(&AdminCommand::Status), "No listeners.\n");

        state.listeners.set_state(5000, ListenerState::Listening);
        state
            .listeners
            .set_local_addr(5000, "127.0.0.1:5000".parse().unwrap());
        state.listeners.set_state(5001, ListenerState::Failed("in use".to_string()));

        assert_eq!(
            console.execute(&AdminCommand::Status),
            "Listeners:\n  Port 5000: listening on 127.0.0.1:5000 (0 active connections)\n  Port 5001: failed (in use) (0 active connections)\n"
        );
    }

    #[tokio::test]
    async fn test_script_until_exit() {
        let (console, state) = console();
        let output = run_script(console, "\nhello\nlogs x\nexit\nclients\n").await;

        assert!(output.starts_with(BANNER));
        assert!(output.contains("Unknown admin command: hello\n"));
        assert!(output.contains(LOGS_USAGE));
        assert!(output.ends_with("Admin requested shutdown.\n"));
        assert!(!output.contains("No connected clients."));
        assert!(state.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_reported_and_skipped() {
        let (console, state) = console();
        let script: &[u8] = b"\xff\xfe\nclients\nexit\n";
        let mut output = Vec::new();
        console.run(script, &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains(INVALID_INPUT));
        assert!(output.contains("No connected clients.\n"));
        assert!(output.ends_with("Admin requested shutdown.\n"));
        assert!(state.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_end_of_input_does_not_trigger_shutdown() {
        let (console, state) = console();
        let output = run_script(console, "clients\n").await;
        assert!(output.contains("No connected clients."));
        assert!(!state.shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_console_stops_when_shutdown_triggered_elsewhere() {
        let (console, state) = console();
        let (reader, _writer) = tokio::io::duplex(64);
        let handle = tokio::spawn(async move {
            console
                .run(tokio::io::BufReader::new(reader), tokio::io::sink())
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        state.shutdown.trigger();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
