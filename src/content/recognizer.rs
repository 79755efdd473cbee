//! Rocker and wheel gesture recognition for one browsing context.
//!
//! A rocker gesture is a button press while exactly one other button is
//! held. A wheel gesture is a wheel turn while only the gesture button is
//! held. Once a gesture fired, the mouseup, click and contextmenu events that
//! follow are suppressed until the next "fresh" mousedown (no other button
//! held) or a wheel turn with no buttons held resets the flag.
//!
//! The flag is replicated across every context of the window: each write is
//! sent to the coordinator, and writes from other contexts arrive through
//! [`MouseGestureObserver::handle_message`]. This keeps suppression working
//! when a gesture switches tabs and the release lands in another document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use super::SharedSettings;
use crate::buttons::{from_buttons, to_buttons};
use crate::gesture::Gesture;
use crate::host::{
    ContextId, EventTarget, GestureEvent, ListenerId, MouseEvent, MouseEventKind, MouseListener,
};
use crate::ipc::port::PortSender;
use crate::ipc::{BackgroundMessage, ContentMessage, MouseState};

pub struct MouseGestureObserver {
    context: ContextId,
    document: Arc<dyn EventTarget>,
    port: PortSender,
    settings: Arc<SharedSettings>,
    /// Local replica of the window's gesture-in-progress flag.
    performing_gesture: AtomicBool,
    /// Set on the first local write; the initial query reply is then stale.
    written_locally: AtomicBool,
    bound: Mutex<Vec<(MouseEventKind, ListenerId)>>,
}

impl MouseGestureObserver {
    /// Register capturing listeners for all observed event kinds on
    /// `document`. The flag starts out `false` until
    /// [`apply_mouse_state`](Self::apply_mouse_state) delivers the window state.
    pub fn attach(
        document: Arc<dyn EventTarget>,
        port: PortSender,
        settings: Arc<SharedSettings>,
    ) -> Arc<Self> {
        let observer = Arc::new(Self {
            context: port.context(),
            document: Arc::clone(&document),
            port,
            settings,
            performing_gesture: AtomicBool::new(false),
            written_locally: AtomicBool::new(false),
            bound: Mutex::new(Vec::with_capacity(MouseEventKind::ALL.len())),
        });

        let mut bound = Vec::with_capacity(MouseEventKind::ALL.len());
        for kind in MouseEventKind::ALL {
            let weak = Arc::downgrade(&observer);
            let listener: MouseListener = Arc::new(move |event: &mut MouseEvent| {
                if let Some(observer) = Weak::upgrade(&weak) {
                    observer.handle_event(event);
                }
            });
            bound.push((kind, document.add_event_listener(kind, listener, true)));
        }
        *observer.bound.lock().unwrap_or_else(|e| e.into_inner()) = bound;

        debug!(context = %observer.context, "Mouse gesture observer attached");
        observer
    }

    /// Remove exactly the listeners added by [`attach`](Self::attach).
    /// Safe to call more than once.
    pub fn detach(&self) {
        let bound: Vec<_> = self
            .bound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        if bound.is_empty() {
            return;
        }
        for (kind, id) in bound {
            self.document.remove_event_listener(kind, id, true);
        }
        debug!(context = %self.context, "Mouse gesture observer detached");
    }

    pub fn is_attached(&self) -> bool {
        !self.bound.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn performing_gesture(&self) -> bool {
        self.performing_gesture.load(Ordering::Acquire)
    }

    /// Write the flag and announce the write to the other contexts.
    pub fn set_performing_gesture(&self, value: bool) {
        self.written_locally.store(true, Ordering::Release);
        self.performing_gesture.store(value, Ordering::Release);
        self.port.send(ContentMessage::PerformingGesture { value });
    }

    /// Apply the reply to the attach-time state query, unless this context
    /// already wrote the flag itself in the meantime.
    pub fn apply_mouse_state(&self, state: &MouseState) {
        if self.written_locally.load(Ordering::Acquire) {
            debug!(context = %self.context, "Ignoring stale initial mouse state");
            return;
        }
        self.performing_gesture
            .store(state.performing_gesture, Ordering::Release);
    }

    /// Apply a relayed flag write from another context. Echoes of this
    /// context's own writes are ignored.
    pub fn handle_message(&self, message: &BackgroundMessage) {
        if let BackgroundMessage::PerformingGesture { value, sender } = message {
            if *sender == self.context {
                return;
            }
            self.performing_gesture.store(*value, Ordering::Release);
        }
    }

    pub fn handle_event(&self, event: &mut MouseEvent) {
        match event.kind {
            MouseEventKind::MouseDown => self.mousedown(event),
            MouseEventKind::MouseUp => self.mouseup(event),
            MouseEventKind::Click | MouseEventKind::ContextMenu => self.click(event),
            MouseEventKind::Wheel => self.wheel(event),
        }
    }

    /// Note: the "base" of a rocker gesture can change mid-gesture (hold
    /// right, press left, release right, press right again). Each press is
    /// judged only by what was held just before it.
    fn mousedown(&self, event: &mut MouseEvent) {
        if !event.is_trusted {
            return;
        }
        let Some(pressed) = to_buttons(event.button) else {
            self.trace(event);
            return;
        };
        let old_state = event.buttons & !pressed;
        self.trace(event);

        if old_state == 0 {
            self.set_performing_gesture(false);
        } else if let Some(first_button) = from_buttons(old_state) {
            self.emit(
                event,
                Gesture::Rocker {
                    first_button,
                    second_button: event.button,
                },
            );
            self.set_performing_gesture(true);
            suppress(event);
        }
    }

    fn mouseup(&self, event: &mut MouseEvent) {
        if !event.is_trusted {
            return;
        }
        self.trace(event);

        if self.performing_gesture() {
            suppress(event);
        }
    }

    /// Shared by click and contextmenu: both must not leak out of a gesture.
    fn click(&self, event: &mut MouseEvent) {
        if !event.is_genuine_mouse() {
            return;
        }

        if self.performing_gesture() {
            debug!(context = %self.context, "suppressed {}", event.kind);
            suppress(event);
            return;
        }

        self.trace(event);
    }

    fn wheel(&self, event: &mut MouseEvent) {
        if !event.is_genuine_mouse() {
            return;
        }

        if event.buttons == 0 {
            // The gesture button may have been released outside this context.
            self.set_performing_gesture(false);
        } else if from_buttons(event.buttons) == Some(self.settings.gesture_button()) {
            self.emit(event, Gesture::wheel(event.delta_y));
            self.set_performing_gesture(true);
            suppress(event);
            return;
        }

        self.trace(event);
    }

    fn emit(&self, event: &MouseEvent, gesture: Gesture) {
        debug!(context = %self.context, id = %gesture, "gesture");
        self.document
            .dispatch_gesture(GestureEvent::new(Arc::clone(&event.target), gesture));
    }

    /// Per-event diagnostics, shown only with the `debug` preference on.
    fn trace(&self, event: &MouseEvent) {
        if !self.settings.debug() {
            return;
        }
        info!(
            context = %self.context,
            kind = %event.kind,
            buttons = event.buttons,
            button = event.button,
            delta_y = event.delta_y,
            performing_gesture = self.performing_gesture(),
            "{}",
            event.kind
        );
    }
}

impl Drop for MouseGestureObserver {
    fn drop(&mut self) {
        self.detach();
    }
}

fn suppress(event: &mut MouseEvent) {
    event.prevent_default();
    event.stop_propagation();
}
