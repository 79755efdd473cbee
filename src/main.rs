//! Gesticulate driver: runs the gesture engine against a simulated browser.
//!
//! Commands arrive as JSON lines on stdin; engine and browser events go out
//! as JSON lines on stdout. Logs go to stderr and the rolling log file.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use gesticulate::config::paths::get_prefs_path;
use gesticulate::config::store::LocalStorage;
use gesticulate::host::sim::{SimElement, SimEvent, SimHost};
use gesticulate::host::{Element, MouseEvent};
use gesticulate::ipc::bridge::{emit_error, emit_event, spawn_stdin_reader, DriverCommand, DriverEvent};
use gesticulate::{logger, Extension, Preferences, ShutdownReason};

#[tokio::main]
async fn main() {
    if let Err(e) = logger::init() {
        eprintln!("Logger initialization failed: {e}");
    }

    let store = Arc::new(LocalStorage::open(get_prefs_path()));
    let (host, mut sim_events) = SimHost::new();

    let prefs = match Preferences::load(store.clone()) {
        Ok(p) => p,
        Err(e) => {
            emit_error(&format!("Failed to load preferences: {e:#}"));
            return;
        }
    };
    let extension = match Extension::startup(store, host.tabs()) {
        Ok(ext) => ext,
        Err(e) => {
            emit_error(&format!("Startup failed: {e:#}"));
            return;
        }
    };

    let mut driver = Driver {
        host,
        extension,
        prefs,
    };
    let mut cmd_rx = spawn_stdin_reader();

    emit_event(&DriverEvent::Ready {});
    info!("Gesticulate ready");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => {
                        if !driver.handle_command(command) {
                            break; // Stop command received
                        }
                    }
                    None => {
                        // stdin closed, parent process gone
                        info!("stdin closed, shutting down");
                        driver.extension.shutdown(ShutdownReason::AppShutdown);
                        break;
                    }
                }
            }
            Some(event) = sim_events.recv() => {
                emit_event(&event);
            }
        }
    }

    flush_sim_events(&mut sim_events);
    info!("Gesticulate shutting down");
}

fn flush_sim_events(rx: &mut mpsc::UnboundedReceiver<SimEvent>) {
    while let Ok(event) = rx.try_recv() {
        emit_event(&event);
    }
}

struct Driver {
    host: SimHost,
    extension: Extension,
    prefs: Preferences,
}

impl Driver {
    /// Handle a single command. Returns `false` if the main loop should exit.
    fn handle_command(&mut self, cmd: DriverCommand) -> bool {
        match cmd {
            DriverCommand::Ping {} => {
                emit_event(&DriverEvent::Pong {});
            }

            DriverCommand::Stop {} => {
                self.extension.shutdown(ShutdownReason::AddonDisable);
                emit_event(&DriverEvent::Stopping {});
                return false;
            }

            DriverCommand::OpenTab {
                window,
                tab,
                active,
            } => {
                if self.host.document(tab).is_some() {
                    emit_error(&format!("{tab} is already open"));
                    return true;
                }
                let context = self.host.open_tab(window, tab, active);
                if let Err(e) = self.extension.attach(context) {
                    emit_error(&format!("Failed to attach to {tab}: {e:#}"));
                }
            }

            DriverCommand::CloseTab { tab } => match self.host.close_tab(tab) {
                Some(context) => {
                    self.extension.detach(context);
                }
                None => emit_error(&format!("{tab} is not open")),
            },

            DriverCommand::Mouse {
                tab,
                kind,
                buttons,
                button,
                delta_y,
                trusted,
                source,
                target,
            } => {
                let Some(document) = self.host.document(tab) else {
                    emit_error(&format!("{tab} is not open"));
                    return true;
                };
                let element = match target {
                    Some(spec) => SimElement::new(&spec.tag, spec.width, spec.height),
                    None => SimElement::body(),
                };
                let before = element.size();

                let mut event = MouseEvent::new(kind, element.clone())
                    .with_buttons(buttons)
                    .with_button(button)
                    .with_delta_y(delta_y)
                    .with_source(source);
                if !trusted {
                    event = event.untrusted();
                }
                document.dispatch(&mut event);

                emit_event(&DriverEvent::Dispatched {
                    tab,
                    kind,
                    default_prevented: event.default_prevented(),
                    propagation_stopped: event.propagation_stopped(),
                });
                let (width, height) = element.size();
                if (width, height) != before {
                    emit_event(&DriverEvent::ImageResized { tab, width, height });
                }
            }

            DriverCommand::SetPref { key, value } => {
                info!(%key, "Preference update requested");
                if let Err(e) = self.prefs.set_pref(&key, value) {
                    warn!(%key, "Failed to set preference: {e:#}");
                    emit_error(&format!("Failed to set {key}: {e:#}"));
                }
            }

            DriverCommand::ResetPref { key } => {
                if let Err(e) = self.prefs.reset_pref(&key) {
                    warn!(%key, "Failed to reset preference: {e:#}");
                    emit_error(&format!("Failed to reset {key}: {e:#}"));
                }
            }
        }
        true
    }
}
