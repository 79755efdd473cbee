//! Per-window relay for the gesture-in-progress flag.
//!
//! Each context keeps its own replica of the flag. The coordinator holds no
//! independent truth: it remembers the last value it relayed (to answer
//! state queries from newly attached contexts) and forwards every write to
//! all other connected contexts of the window.
//!
//! The coordinator runs as a single tokio task that owns all its state, so
//! connect, disconnect and broadcast are serialized without locking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::tabs::cycle_tab;
use crate::config::store::StorageChanges;
use crate::config::Preferences;
use crate::host::{ContextId, TabHost, WindowId};
use crate::ipc::port::{CoordinatorRequest, Port};
use crate::ipc::{BackgroundMessage, ContentMessage, MouseState};

/// Cloneable handle used to connect contexts to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    window: WindowId,
    tx: mpsc::UnboundedSender<CoordinatorRequest>,
}

impl CoordinatorHandle {
    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn connect(&self, context: ContextId) -> Port {
        Port::connect(context, self.tx.clone())
    }

    /// False once the coordinator task has stopped.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct Coordinator {
    window: WindowId,
    ports: HashMap<ContextId, mpsc::UnboundedSender<BackgroundMessage>>,
    performing_gesture: bool,
    prefs: Preferences,
    tabs: Arc<dyn TabHost>,
}

impl Coordinator {
    pub fn new(window: WindowId, prefs: Preferences, tabs: Arc<dyn TabHost>) -> Self {
        Self {
            window,
            ports: HashMap::new(),
            performing_gesture: false,
            prefs,
            tabs,
        }
    }

    /// Run the coordinator on the current tokio runtime.
    pub fn spawn(self) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let window = self.window;
        let changes = self.prefs.subscribe();
        tokio::spawn(self.run(rx, changes));
        CoordinatorHandle { window, tx }
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<CoordinatorRequest>,
        mut changes: tokio::sync::broadcast::Receiver<StorageChanges>,
    ) {
        info!(window = %self.window, "Coordinator started");
        let mut store_open = true;
        loop {
            tokio::select! {
                req = rx.recv() => match req {
                    Some(req) => self.handle(req),
                    None => break,
                },
                change = changes.recv(), if store_open => match change {
                    Ok(change) => {
                        self.prefs.apply_changes(&change);
                        self.broadcast_settings();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(window = %self.window, skipped, "Missed preference changes, reloading");
                        if let Err(e) = self.prefs.reload() {
                            warn!(window = %self.window, "Preference reload failed: {:#}", e);
                        }
                        self.broadcast_settings();
                    }
                    Err(RecvError::Closed) => store_open = false,
                },
            }
        }
        info!(window = %self.window, "Coordinator stopped");
    }

    /// Process one request.
    pub fn handle(&mut self, req: CoordinatorRequest) {
        match req {
            CoordinatorRequest::Connect { context, tx } => {
                debug!(window = %self.window, %context, "Context connected");
                self.ports.insert(context, tx);
            }
            CoordinatorRequest::Disconnect { context } => {
                if self.ports.remove(&context).is_some() {
                    debug!(window = %self.window, %context, "Context disconnected");
                }
            }
            CoordinatorRequest::Query { reply } => {
                // Requester may have gone away already.
                let _ = reply.send(self.query());
            }
            CoordinatorRequest::Message { sender, message } => match message {
                ContentMessage::PerformingGesture { value } => {
                    self.performing_gesture = value;
                    self.broadcast(
                        BackgroundMessage::PerformingGesture { value, sender },
                        Some(sender),
                    );
                }
                ContentMessage::CycleTab { offset } => {
                    if let Err(e) = cycle_tab(self.tabs.as_ref(), self.window, offset) {
                        warn!(window = %self.window, offset, "Tab cycle failed: {:#}", e);
                    }
                }
            },
        }
    }

    /// Last relayed flag value plus current settings.
    pub fn query(&self) -> MouseState {
        MouseState {
            performing_gesture: self.performing_gesture,
            settings: self.prefs.settings(),
        }
    }

    pub fn connected(&self) -> usize {
        self.ports.len()
    }

    /// Deliver `message` to every connected context except `excluding`.
    /// Contexts whose receiver is gone are dropped from the set.
    pub fn broadcast(&mut self, message: BackgroundMessage, excluding: Option<ContextId>) {
        let window = self.window;
        self.ports.retain(|context, tx| {
            if Some(*context) == excluding {
                return true;
            }
            match tx.send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(%window, %context, "Dropping closed channel");
                    false
                }
            }
        });
    }

    fn broadcast_settings(&mut self) {
        let settings = self.prefs.settings();
        info!(window = %self.window, ?settings, "Broadcasting settings");
        self.broadcast(BackgroundMessage::Settings { settings }, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::LocalStorage;
    use crate::config::PREF_GESTURE_BUTTON;
    use crate::host::sim::SimTabs;
    use crate::host::TabId;

    fn coordinator() -> (Coordinator, Arc<SimTabs>) {
        let prefs = Preferences::load(Arc::new(LocalStorage::in_memory())).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let tabs = Arc::new(SimTabs::new(tx));
        (Coordinator::new(WindowId(1), prefs, tabs.clone()), tabs)
    }

    fn connect(
        coordinator: &mut Coordinator,
    ) -> (ContextId, mpsc::UnboundedReceiver<BackgroundMessage>) {
        let context = ContextId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        coordinator.handle(CoordinatorRequest::Connect { context, tx });
        (context, rx)
    }

    fn gesture(sender: ContextId, value: bool) -> CoordinatorRequest {
        CoordinatorRequest::Message {
            sender,
            message: ContentMessage::PerformingGesture { value },
        }
    }

    #[test]
    fn broadcast_skips_sender() {
        let (mut c, _) = coordinator();
        let (x, mut rx_x) = connect(&mut c);
        let (_y, mut rx_y) = connect(&mut c);
        let (_z, mut rx_z) = connect(&mut c);

        c.handle(gesture(x, true));

        let expected = BackgroundMessage::PerformingGesture {
            value: true,
            sender: x,
        };
        assert_eq!(rx_y.try_recv().unwrap(), expected);
        assert_eq!(rx_z.try_recv().unwrap(), expected);
        assert!(rx_x.try_recv().is_err());
    }

    #[test]
    fn query_reports_last_relayed_value() {
        let (mut c, _) = coordinator();
        let (x, _rx) = connect(&mut c);
        assert!(!c.query().performing_gesture);
        c.handle(gesture(x, true));
        assert!(c.query().performing_gesture);
        c.handle(gesture(x, false));
        assert!(!c.query().performing_gesture);
    }

    #[test]
    fn closed_channels_are_dropped_silently() {
        let (mut c, _) = coordinator();
        let (x, _rx_x) = connect(&mut c);
        let (_y, rx_y) = connect(&mut c);
        drop(rx_y);

        c.handle(gesture(x, true));
        assert_eq!(c.connected(), 1);
    }

    #[test]
    fn disconnect_removes_context() {
        let (mut c, _) = coordinator();
        let (x, _rx_x) = connect(&mut c);
        let (y, mut rx_y) = connect(&mut c);
        c.handle(CoordinatorRequest::Disconnect { context: y });
        // Unknown contexts are fine too.
        c.handle(CoordinatorRequest::Disconnect {
            context: ContextId::new(),
        });
        c.handle(gesture(x, true));
        assert_eq!(c.connected(), 1);
        assert!(rx_y.try_recv().is_err());
    }

    #[test]
    fn cycle_tab_request() {
        let (mut c, tabs) = coordinator();
        tabs.open(WindowId(1), TabId(1), true);
        tabs.open(WindowId(1), TabId(2), false);
        c.handle(CoordinatorRequest::Message {
            sender: ContextId::new(),
            message: ContentMessage::CycleTab { offset: 1 },
        });
        assert_eq!(tabs.active(WindowId(1)), Some(TabId(2)));
    }

    #[test]
    fn cycle_tab_without_tabs_is_logged_not_fatal() {
        let (mut c, _) = coordinator();
        c.handle(CoordinatorRequest::Message {
            sender: ContextId::new(),
            message: ContentMessage::CycleTab { offset: -1 },
        });
    }

    #[tokio::test]
    async fn spawned_coordinator_answers_queries() {
        let (c, _) = coordinator();
        let handle = c.spawn();
        let port = handle.connect(ContextId::new());
        let state = port.sender.query_mouse_state().await.unwrap();
        assert!(!state.performing_gesture);
        assert_eq!(state.settings.gesture_button, 2);
    }

    #[tokio::test]
    async fn preference_changes_are_broadcast() {
        let store = Arc::new(LocalStorage::in_memory());
        let prefs = Preferences::load(store.clone()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = Coordinator::new(WindowId(1), prefs, Arc::new(SimTabs::new(tx))).spawn();
        let mut port = handle.connect(ContextId::new());
        // Make sure the connect has been processed before the change fires.
        port.sender.query_mouse_state().await.unwrap();

        let mut items = crate::config::store::PrefMap::new();
        items.insert(PREF_GESTURE_BUTTON.into(), serde_json::json!(1));
        crate::config::store::PreferenceStore::set(store.as_ref(), items).unwrap();

        match port.receiver.recv().await.unwrap() {
            BackgroundMessage::Settings { settings } => assert_eq!(settings.gesture_button, 1),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
