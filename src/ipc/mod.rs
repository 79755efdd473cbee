//! Message types exchanged between browsing contexts and the window
//! coordinator.
//!
//! Content -> background messages use `{"type": "<name>", ...}`.
//! Background -> content messages use the same shape.

pub mod bridge;
pub mod port;

use serde::{Deserialize, Serialize};

use crate::config::GestureSettings;
use crate::host::ContextId;

// ---------------------------------------------------------------------------
// Content -> background
// ---------------------------------------------------------------------------

/// Fire-and-forget notifications a context sends to its coordinator. The
/// sender identity is added by the port, not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentMessage {
    /// The context's gesture flag was written.
    PerformingGesture { value: bool },
    /// Activate the tab `offset` places away from the active one.
    CycleTab { offset: i32 },
}

// ---------------------------------------------------------------------------
// Background -> content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BackgroundMessage {
    /// Relayed gesture flag write from `sender`.
    PerformingGesture { value: bool, sender: ContextId },
    /// Preferences changed.
    Settings { settings: GestureSettings },
}

/// Reply to the initial state query a context makes when it attaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseState {
    pub performing_gesture: bool,
    pub settings: GestureSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_message_json() {
        let json = serde_json::to_string(&ContentMessage::CycleTab { offset: -1 }).unwrap();
        assert_eq!(json, r#"{"type":"cycleTab","offset":-1}"#);
        let parsed: ContentMessage =
            serde_json::from_str(r#"{"type":"performingGesture","value":true}"#).unwrap();
        assert_eq!(parsed, ContentMessage::PerformingGesture { value: true });
    }

    #[test]
    fn background_message_carries_sender() {
        let sender = ContextId::new();
        let msg = BackgroundMessage::PerformingGesture {
            value: false,
            sender,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "performingGesture");
        assert_eq!(json["sender"], sender.to_string());
        let parsed: BackgroundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn mouse_state_json() {
        let state = MouseState {
            performing_gesture: true,
            settings: GestureSettings::default(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["performingGesture"], true);
        assert_eq!(json["settings"]["gestureButton"], 2);
        assert_eq!(json["settings"]["bindings"]["rocker:2,0"], "navigateBack");
    }
}
