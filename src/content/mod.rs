//! Content side: everything attached to a single browsing context.
//!
//! A [`ContentScript`] wires a [`MouseGestureObserver`] and a
//! [`GestureHandler`] to one document and pumps messages from the window
//! coordinator into them.

pub mod actions;
pub mod dispatcher;
pub mod recognizer;

use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::background::CoordinatorHandle;
use crate::bindings::Action;
use crate::config::GestureSettings;
use crate::host::{BrowsingContext, ContextId, WindowId};
use crate::ipc::port::PortSender;
use crate::ipc::{BackgroundMessage, MouseState};
use actions::ActionContext;
pub use dispatcher::GestureHandler;
pub use recognizer::MouseGestureObserver;

/// Settings shared by the observer and the handler of one context.
#[derive(Debug, Default)]
pub struct SharedSettings(RwLock<GestureSettings>);

impl SharedSettings {
    pub fn get(&self) -> GestureSettings {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn replace(&self, settings: GestureSettings) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn gesture_button(&self) -> u8 {
        self.0.read().unwrap_or_else(|e| e.into_inner()).gesture_button
    }

    pub fn debug(&self) -> bool {
        self.0.read().unwrap_or_else(|e| e.into_inner()).debug
    }

    pub fn binding(&self, key: &str) -> Option<Action> {
        self.0
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .bindings
            .get(key)
    }
}

/// Gesture support attached to one browsing context.
///
/// Dropping it detaches everything, same as [`ContentScript::detach`].
pub struct ContentScript {
    context: ContextId,
    window: WindowId,
    observer: Arc<MouseGestureObserver>,
    handler: GestureHandler,
    settings: Arc<SharedSettings>,
    port: PortSender,
    pump: JoinHandle<()>,
    detached: bool,
}

impl ContentScript {
    /// Attach to `context` and connect it to the window coordinator. Must run
    /// inside a tokio runtime.
    pub fn attach(context: BrowsingContext, coordinator: &CoordinatorHandle) -> Self {
        let settings = Arc::new(SharedSettings::default());
        let (port, receiver) = coordinator.connect(context.id).split();

        let observer = MouseGestureObserver::attach(
            Arc::clone(&context.document),
            port.clone(),
            Arc::clone(&settings),
        );
        let handler = GestureHandler::attach(
            Arc::clone(&context.document),
            ActionContext {
                history: Arc::clone(&context.history),
                port: port.clone(),
            },
            Arc::clone(&settings),
        );

        let initial = port.query_mouse_state();
        let pump = tokio::spawn(pump_messages(
            Arc::clone(&observer),
            Arc::clone(&settings),
            initial,
            receiver,
        ));

        info!(context = %context.id, window = %context.window, "Content script attached");
        Self {
            context: context.id,
            window: context.window,
            observer,
            handler,
            settings,
            port,
            pump,
            detached: false,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// This context's replica of the window's gesture flag.
    pub fn performing_gesture(&self) -> bool {
        self.observer.performing_gesture()
    }

    pub fn settings(&self) -> GestureSettings {
        self.settings.get()
    }

    /// Remove every listener, leave the coordinator and stop the message pump.
    pub fn detach(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.observer.detach();
        self.handler.detach();
        self.port.disconnect();
        self.pump.abort();
        info!(context = %self.context, "Content script detached");
    }
}

impl Drop for ContentScript {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Apply the attach-time state, then every relayed message, in order.
async fn pump_messages(
    observer: Arc<MouseGestureObserver>,
    settings: Arc<SharedSettings>,
    initial: oneshot::Receiver<MouseState>,
    mut receiver: mpsc::UnboundedReceiver<BackgroundMessage>,
) {
    match initial.await {
        Ok(state) => {
            settings.replace(state.settings.clone());
            observer.apply_mouse_state(&state);
        }
        Err(_) => warn!(context = %observer.context(), "No reply to mouse state query"),
    }

    while let Some(message) = receiver.recv().await {
        match message {
            BackgroundMessage::Settings { settings: updated } => {
                debug!(context = %observer.context(), "Settings updated");
                settings.replace(updated);
            }
            other => observer.handle_message(&other),
        }
    }
    debug!(context = %observer.context(), "Message pump finished");
}
