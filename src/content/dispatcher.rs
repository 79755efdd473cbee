//! Runs the bound action for each recognized gesture.

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::actions::{perform, ActionContext};
use super::SharedSettings;
use crate::bindings::mousedown_key;
use crate::host::{
    EventTarget, GestureEvent, GestureListener, ListenerId, MouseEvent, MouseEventKind,
    MouseListener,
};

#[derive(Default)]
struct Registrations {
    gesture: Option<ListenerId>,
    mousedown: Option<ListenerId>,
}

/// Listens for gesture events (and for presses of the gesture button) on one
/// document and looks their binding up in the current settings.
pub struct GestureHandler {
    document: Arc<dyn EventTarget>,
    registrations: Mutex<Registrations>,
}

impl GestureHandler {
    pub fn attach(
        document: Arc<dyn EventTarget>,
        ctx: ActionContext,
        settings: Arc<SharedSettings>,
    ) -> Self {
        let on_gesture: GestureListener = {
            let ctx = ctx.clone();
            let settings = Arc::clone(&settings);
            Arc::new(move |event: &GestureEvent| {
                let id = event.gesture.id();
                match settings.binding(&id) {
                    Some(action) => perform(action, &ctx, event.target.as_ref()),
                    None => debug!(context = %ctx.port.context(), %id, "No binding for gesture"),
                }
            })
        };

        // Lifecycle trigger: the gesture button going down.
        let on_mousedown: MouseListener = Arc::new(move |event: &mut MouseEvent| {
            if !event.is_trusted || event.button != settings.gesture_button() {
                return;
            }
            if let Some(action) = settings.binding(&mousedown_key(event.button)) {
                perform(action, &ctx, event.target.as_ref());
            }
        });

        let registrations = Registrations {
            gesture: Some(document.add_gesture_listener(on_gesture)),
            mousedown: Some(document.add_event_listener(
                MouseEventKind::MouseDown,
                on_mousedown,
                true,
            )),
        };

        Self {
            document,
            registrations: Mutex::new(registrations),
        }
    }

    /// Remove both listeners. Safe to call more than once.
    pub fn detach(&self) {
        let mut regs = self
            .registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(id) = regs.gesture.take() {
            self.document.remove_gesture_listener(id);
        }
        if let Some(id) = regs.mousedown.take() {
            self.document
                .remove_event_listener(MouseEventKind::MouseDown, id, true);
        }
    }
}

impl Drop for GestureHandler {
    fn drop(&mut self) {
        self.detach();
    }
}
