//! JSON-line bridge for the driver binary: a blocking stdin reader thread
//! that forwards parsed [`DriverCommand`]s through a channel, plus a helper to
//! emit events to stdout.
//!
//! Commands use `{"command": "<name>", ...}`.
//! Events use `{"event": "<name>", "data": {...}}`.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::host::{InputSource, MouseEventKind, TabId, WindowId};

// ---------------------------------------------------------------------------
// Commands: stdin -> driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum DriverCommand {
    OpenTab {
        window: WindowId,
        tab: TabId,
        #[serde(default)]
        active: bool,
    },
    CloseTab {
        tab: TabId,
    },
    Mouse {
        tab: TabId,
        kind: MouseEventKind,
        #[serde(default)]
        buttons: u16,
        #[serde(default)]
        button: u8,
        #[serde(default)]
        delta_y: f64,
        #[serde(default = "default_trusted")]
        trusted: bool,
        #[serde(default)]
        source: InputSource,
        #[serde(default)]
        target: Option<TargetSpec>,
    },
    SetPref {
        key: String,
        value: Value,
    },
    ResetPref {
        key: String,
    },
    Ping {},
    Stop {},
}

fn default_trusted() -> bool {
    true
}

/// Element a simulated mouse event targets. Defaults to `<body>`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub tag: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Events: driver -> stdout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum DriverEvent {
    Ready {},
    Pong {},
    /// Outcome of delivering one native event.
    Dispatched {
        tab: TabId,
        kind: MouseEventKind,
        default_prevented: bool,
        propagation_stopped: bool,
    },
    ImageResized {
        tab: TabId,
        width: f64,
        height: f64,
    },
    Error {
        message: String,
    },
    Stopping {},
}

/// Emit any serializable event as a JSON line on stdout and flush.
pub fn emit_event<T: Serialize>(event: &T) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors, the pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

pub fn emit_error(message: &str) {
    emit_event(&DriverEvent::Error {
        message: message.to_string(),
    });
}

/// Accept `{"type": ...}` as an alias for `{"command": ...}`.
fn normalize_command_json(input: &str) -> String {
    if let Ok(mut obj) = serde_json::from_str::<serde_json::Map<String, Value>>(input) {
        if !obj.contains_key("command") {
            if let Some(type_val) = obj.remove("type") {
                obj.insert("command".to_string(), type_val);
                if let Ok(json) = serde_json::to_string(&obj) {
                    return json;
                }
            }
        }
    }
    input.to_string()
}

pub fn parse_command(line: &str) -> Result<DriverCommand, serde_json::Error> {
    serde_json::from_str(&normalize_command_json(line))
}

/// Spawn a blocking thread that reads JSON lines from stdin and forwards the
/// parsed commands. The thread exits when stdin closes.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<DriverCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match parse_command(trimmed) {
                        Ok(cmd) => {
                            debug!(?cmd, "Received command");
                            if tx.send(cmd).is_err() {
                                break; // Receiver dropped, main task is gone.
                            }
                        }
                        Err(e) => {
                            error!("Invalid JSON command: {} (input: {})", e, trimmed);
                            emit_error(&format!("Invalid JSON command: {}", e));
                        }
                    }
                }
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mouse_command_with_defaults() {
        let cmd = parse_command(r#"{"command":"mouse","tab":1,"kind":"mousedown","buttons":3}"#)
            .unwrap();
        match cmd {
            DriverCommand::Mouse {
                tab,
                kind,
                buttons,
                button,
                trusted,
                source,
                target,
                ..
            } => {
                assert_eq!(tab, TabId(1));
                assert_eq!(kind, MouseEventKind::MouseDown);
                assert_eq!(buttons, 3);
                assert_eq!(button, 0);
                assert!(trusted);
                assert_eq!(source, InputSource::Mouse);
                assert!(target.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn type_is_accepted_as_command_tag() {
        let cmd = parse_command(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(cmd, DriverCommand::Ping {}));
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_command(r#"{"command":"explode"}"#).is_err());
        assert!(parse_command("not json").is_err());
    }

    #[test]
    fn dispatched_event_json() {
        let ev = DriverEvent::Dispatched {
            tab: TabId(2),
            kind: MouseEventKind::ContextMenu,
            default_prevented: true,
            propagation_stopped: true,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "dispatched");
        assert_eq!(json["data"]["tab"], 2);
        assert_eq!(json["data"]["kind"], "contextmenu");
    }
}
