//! Rocker and wheel mouse gestures for browser contexts.
//!
//! The content side ([`content`]) watches native mouse events in each
//! browsing context and turns them into gestures. The background side
//! ([`background`]) keeps one coordinator per window that replicates the
//! "gesture in progress" flag across that window's contexts and switches
//! tabs on request. Browser capabilities are reached through the traits in
//! [`host`].

pub mod background;
pub mod bindings;
pub mod buttons;
pub mod config;
pub mod content;
pub mod extension;
pub mod gesture;
pub mod host;
pub mod ipc;
pub mod logger;

pub use bindings::{Action, Bindings};
pub use config::{GestureSettings, Preferences};
pub use extension::{Extension, ShutdownReason};
pub use gesture::{Gesture, GestureDetail};
