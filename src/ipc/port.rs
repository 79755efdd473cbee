//! Persistent channel between one browsing context and its window
//! coordinator.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{BackgroundMessage, ContentMessage, MouseState};
use crate::host::ContextId;

/// Everything a coordinator task receives.
#[derive(Debug)]
pub enum CoordinatorRequest {
    Connect {
        context: ContextId,
        tx: mpsc::UnboundedSender<BackgroundMessage>,
    },
    Disconnect {
        context: ContextId,
    },
    Query {
        reply: oneshot::Sender<MouseState>,
    },
    Message {
        sender: ContextId,
        message: ContentMessage,
    },
}

/// Outbound half of a [`Port`]. Cheap to clone; every clone tags its
/// messages with the same context id.
#[derive(Debug, Clone)]
pub struct PortSender {
    context: ContextId,
    tx: mpsc::UnboundedSender<CoordinatorRequest>,
}

impl PortSender {
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Send a notification. A coordinator that is already gone is not an
    /// error for the caller.
    pub fn send(&self, message: ContentMessage) {
        if let Err(e) = self.tx.send(CoordinatorRequest::Message {
            sender: self.context,
            message,
        }) {
            debug!(context = %self.context, "Coordinator gone, dropped {:?}", e.0);
        }
    }

    /// Ask for the current window state. The receiver errors if the
    /// coordinator stops before replying.
    pub fn query_mouse_state(&self) -> oneshot::Receiver<MouseState> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(CoordinatorRequest::Query { reply });
        rx
    }

    /// Remove this context from the coordinator's delivery set.
    pub fn disconnect(&self) {
        let _ = self.tx.send(CoordinatorRequest::Disconnect {
            context: self.context,
        });
    }
}

/// Both halves of a context's connection.
#[derive(Debug)]
pub struct Port {
    pub sender: PortSender,
    pub receiver: mpsc::UnboundedReceiver<BackgroundMessage>,
}

impl Port {
    /// Register `context` with the coordinator behind `coordinator`.
    pub(crate) fn connect(
        context: ContextId,
        coordinator: mpsc::UnboundedSender<CoordinatorRequest>,
    ) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        let _ = coordinator.send(CoordinatorRequest::Connect { context, tx });
        Self {
            sender: PortSender {
                context,
                tx: coordinator,
            },
            receiver,
        }
    }

    pub fn split(self) -> (PortSender, mpsc::UnboundedReceiver<BackgroundMessage>) {
        (self.sender, self.receiver)
    }
}
