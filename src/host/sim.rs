//! In-memory host.
//!
//! Implements every host trait with plain data structures and reports the
//! observable side effects (gesture events, navigation, tab activation) as
//! [`SimEvent`]s on a channel. Used by the driver binary and by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    BrowsingContext, ContextId, Element, EventTarget, GestureEvent, GestureListener, History,
    ListenerId, MouseEvent, MouseEventKind, MouseListener, Tab, TabHost, TabId, WindowId,
};
use crate::gesture::GestureDetail;

/// Side effects observed by the in-memory host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum SimEvent {
    Gesture {
        context: ContextId,
        #[serde(flatten)]
        detail: GestureDetail,
    },
    Navigated {
        context: ContextId,
        direction: NavDirection,
    },
    TabActivated {
        window: WindowId,
        tab: TabId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavDirection {
    Back,
    Forward,
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SimElement {
    tag: String,
    size: Mutex<(f64, f64)>,
}

impl SimElement {
    pub fn new(tag: &str, width: f64, height: f64) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.to_uppercase(),
            size: Mutex::new((width, height)),
        })
    }

    /// A zero-sized `<body>`, the default target for driver events.
    pub fn body() -> Arc<Self> {
        Self::new("body", 0.0, 0.0)
    }
}

impl Element for SimElement {
    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn size(&self) -> (f64, f64) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_size(&self, width: f64, height: f64) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = (width, height);
    }
}

// ---------------------------------------------------------------------------
// Document (event target)
// ---------------------------------------------------------------------------

struct Registration {
    id: ListenerId,
    kind: MouseEventKind,
    use_capture: bool,
    listener: MouseListener,
}

/// Event target for one simulated context.
///
/// Capturing listeners run first; bubbling listeners stand in for page
/// scripts and only run if propagation was not stopped.
pub struct SimDocument {
    context: ContextId,
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
    gesture_listeners: Mutex<Vec<(ListenerId, GestureListener)>>,
    events: mpsc::UnboundedSender<SimEvent>,
}

impl SimDocument {
    pub fn new(context: ContextId, events: mpsc::UnboundedSender<SimEvent>) -> Arc<Self> {
        Arc::new(Self {
            context,
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            gesture_listeners: Mutex::new(Vec::new()),
            events,
        })
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Deliver a native event: capture phase, then (unless stopped) bubble.
    pub fn dispatch(&self, event: &mut MouseEvent) {
        for use_capture in [true, false] {
            if !use_capture && event.propagation_stopped() {
                break;
            }
            // Snapshot so listeners may (de)register without deadlocking.
            let phase: Vec<MouseListener> = self
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|r| r.kind == event.kind && r.use_capture == use_capture)
                .map(|r| Arc::clone(&r.listener))
                .collect();
            for listener in phase {
                listener(&mut *event);
            }
        }
    }

    /// Number of registered native-event listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn gesture_listener_count(&self) -> usize {
        self.gesture_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl EventTarget for SimDocument {
    fn add_event_listener(
        &self,
        kind: MouseEventKind,
        listener: MouseListener,
        use_capture: bool,
    ) -> ListenerId {
        let id = self.next_listener_id();
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Registration {
                id,
                kind,
                use_capture,
                listener,
            });
        id
    }

    fn remove_event_listener(
        &self,
        kind: MouseEventKind,
        id: ListenerId,
        use_capture: bool,
    ) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|r| !(r.id == id && r.kind == kind && r.use_capture == use_capture));
        listeners.len() != before
    }

    fn add_gesture_listener(&self, listener: GestureListener) -> ListenerId {
        let id = self.next_listener_id();
        self.gesture_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    fn remove_gesture_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .gesture_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn dispatch_gesture(&self, event: GestureEvent) {
        let _ = self.events.send(SimEvent::Gesture {
            context: self.context,
            detail: event.gesture.into(),
        });
        let listeners: Vec<GestureListener> = self
            .gesture_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

pub struct SimHistory {
    context: ContextId,
    events: mpsc::UnboundedSender<SimEvent>,
}

impl SimHistory {
    fn navigate(&self, direction: NavDirection) {
        debug!(context = %self.context, ?direction, "history navigation");
        let _ = self.events.send(SimEvent::Navigated {
            context: self.context,
            direction,
        });
    }
}

impl History for SimHistory {
    fn back(&self) {
        self.navigate(NavDirection::Back);
    }

    fn forward(&self) {
        self.navigate(NavDirection::Forward);
    }
}

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

pub struct SimTabs {
    windows: Mutex<BTreeMap<WindowId, Vec<Tab>>>,
    events: mpsc::UnboundedSender<SimEvent>,
}

impl SimTabs {
    pub fn new(events: mpsc::UnboundedSender<SimEvent>) -> Self {
        Self {
            windows: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Append a tab to `window`. An active tab deactivates its siblings.
    pub fn open(&self, window: WindowId, id: TabId, active: bool) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let tabs = windows.entry(window).or_default();
        if active {
            for tab in tabs.iter_mut() {
                tab.active = false;
            }
        }
        tabs.push(Tab { id, active });
    }

    pub fn close(&self, id: TabId) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        for tabs in windows.values_mut() {
            tabs.retain(|t| t.id != id);
        }
    }

    pub fn active(&self, window: WindowId) -> Option<TabId> {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&window)?
            .iter()
            .find(|t| t.active)
            .map(|t| t.id)
    }
}

impl TabHost for SimTabs {
    fn query(&self, window: WindowId) -> anyhow::Result<Vec<Tab>> {
        Ok(self
            .windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&window)
            .cloned()
            .unwrap_or_default())
    }

    fn activate(&self, id: TabId) -> anyhow::Result<()> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let (window, tabs) = windows
            .iter_mut()
            .find(|(_, tabs)| tabs.iter().any(|t| t.id == id))
            .ok_or_else(|| anyhow::anyhow!("no such tab: {}", id))?;
        for tab in tabs.iter_mut() {
            tab.active = tab.id == id;
        }
        let _ = self.events.send(SimEvent::TabActivated {
            window: *window,
            tab: id,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// A whole simulated browser: windows of tabs, one context per tab.
pub struct SimHost {
    tabs: Arc<SimTabs>,
    events: mpsc::UnboundedSender<SimEvent>,
    documents: Mutex<HashMap<TabId, (ContextId, Arc<SimDocument>)>>,
}

impl SimHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SimEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            tabs: Arc::new(SimTabs::new(tx.clone())),
            events: tx,
            documents: Mutex::new(HashMap::new()),
        };
        (host, rx)
    }

    pub fn tabs(&self) -> Arc<SimTabs> {
        Arc::clone(&self.tabs)
    }

    /// Open a tab and return the browsing context for its document.
    pub fn open_tab(&self, window: WindowId, tab: TabId, active: bool) -> BrowsingContext {
        self.tabs.open(window, tab, active);
        let id = ContextId::new();
        let document = SimDocument::new(id, self.events.clone());
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tab, (id, Arc::clone(&document)));
        BrowsingContext {
            id,
            window,
            document,
            history: Arc::new(SimHistory {
                context: id,
                events: self.events.clone(),
            }),
        }
    }

    /// Close a tab, returning the id of the context that lived in it.
    pub fn close_tab(&self, tab: TabId) -> Option<ContextId> {
        self.tabs.close(tab);
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&tab)
            .map(|(id, _)| id)
    }

    pub fn document(&self, tab: TabId) -> Option<Arc<SimDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tab)
            .map(|(_, doc)| Arc::clone(doc))
    }
}
