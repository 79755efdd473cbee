//! Host collaborators: the browser-side surfaces the gesture core consumes.
//!
//! The core never talks to a real browser directly. It registers listeners on
//! an [`EventTarget`], navigates through a [`History`], and cycles tabs
//! through a [`TabHost`]. [`sim`] provides an in-memory host for the driver
//! binary and the tests.

pub mod sim;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gesture::Gesture;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identity of one browsing context (tab or frame document). Used as the
/// sender tag on state-change broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logical window: the group of contexts sharing one gesture flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// Handle returned by listener registration, needed to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The native event kinds the recognizer listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseEventKind {
    MouseDown,
    MouseUp,
    Click,
    ContextMenu,
    Wheel,
}

impl MouseEventKind {
    pub const ALL: [MouseEventKind; 5] = [
        MouseEventKind::MouseDown,
        MouseEventKind::MouseUp,
        MouseEventKind::Click,
        MouseEventKind::ContextMenu,
        MouseEventKind::Wheel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::ContextMenu => "contextmenu",
            Self::Wheel => "wheel",
        }
    }
}

impl fmt::Display for MouseEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical source of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    Mouse,
    Pen,
    Touch,
    Keyboard,
    Unknown,
}

/// A page element an event can target.
pub trait Element: fmt::Debug + Send + Sync {
    /// Upper-case tag name, e.g. `"IMG"`.
    fn tag_name(&self) -> String;
    /// Current `(width, height)`.
    fn size(&self) -> (f64, f64);
    fn set_size(&self, width: f64, height: f64);
}

/// A native mouse or wheel event as delivered by the host.
#[derive(Debug, Clone)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    /// Bitmask of buttons held while the event fired.
    pub buttons: u16,
    /// Index of the button that changed state.
    pub button: u8,
    pub delta_y: f64,
    /// False for script-dispatched events.
    pub is_trusted: bool,
    pub input_source: InputSource,
    pub target: Arc<dyn Element>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl MouseEvent {
    /// A trusted mouse event with no buttons held.
    pub fn new(kind: MouseEventKind, target: Arc<dyn Element>) -> Self {
        Self {
            kind,
            buttons: 0,
            button: 0,
            delta_y: 0.0,
            is_trusted: true,
            input_source: InputSource::Mouse,
            target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn with_buttons(mut self, buttons: u16) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_button(mut self, button: u8) -> Self {
        self.button = button;
        self
    }

    pub fn with_delta_y(mut self, delta_y: f64) -> Self {
        self.delta_y = delta_y;
        self
    }

    pub fn with_source(mut self, source: InputSource) -> Self {
        self.input_source = source;
        self
    }

    pub fn untrusted(mut self) -> Self {
        self.is_trusted = false;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// True if the event came from real mouse hardware rather than a script
    /// or another pointer type.
    pub fn is_genuine_mouse(&self) -> bool {
        self.is_trusted && self.input_source == InputSource::Mouse
    }
}

/// The synthesized event carrying a recognized gesture. Always bubbles and is
/// not cancelable.
#[derive(Debug, Clone)]
pub struct GestureEvent {
    pub target: Arc<dyn Element>,
    pub gesture: Gesture,
    pub bubbles: bool,
    pub cancelable: bool,
}

impl GestureEvent {
    pub fn new(target: Arc<dyn Element>, gesture: Gesture) -> Self {
        Self {
            target,
            gesture,
            bubbles: true,
            cancelable: false,
        }
    }
}

pub type MouseListener = Arc<dyn Fn(&mut MouseEvent) + Send + Sync>;
pub type GestureListener = Arc<dyn Fn(&GestureEvent) + Send + Sync>;

/// Listener registration and event dispatch for one browsing context.
pub trait EventTarget: Send + Sync {
    fn add_event_listener(
        &self,
        kind: MouseEventKind,
        listener: MouseListener,
        use_capture: bool,
    ) -> ListenerId;

    /// Returns `false` if no such listener was registered.
    fn remove_event_listener(&self, kind: MouseEventKind, id: ListenerId, use_capture: bool)
        -> bool;

    fn add_gesture_listener(&self, listener: GestureListener) -> ListenerId;

    fn remove_gesture_listener(&self, id: ListenerId) -> bool;

    /// Deliver a gesture event to the gesture listeners of this context.
    fn dispatch_gesture(&self, event: GestureEvent);
}

/// Per-context session history.
pub trait History: Send + Sync {
    fn back(&self);
    fn forward(&self);
}

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub active: bool,
}

/// Window-level tab management.
pub trait TabHost: Send + Sync {
    /// Tabs of `window` in display order.
    fn query(&self, window: WindowId) -> anyhow::Result<Vec<Tab>>;
    fn activate(&self, tab: TabId) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Browsing context
// ---------------------------------------------------------------------------

/// Everything the content side needs from one tab or frame.
#[derive(Clone)]
pub struct BrowsingContext {
    pub id: ContextId,
    pub window: WindowId,
    pub document: Arc<dyn EventTarget>,
    pub history: Arc<dyn History>,
}

impl fmt::Debug for BrowsingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowsingContext")
            .field("id", &self.id)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
