//! Preferences: defaults layered under a [`PreferenceStore`].

pub mod paths;
pub mod store;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::bindings::Bindings;
use crate::buttons;
use store::{PrefMap, PreferenceStore, StorageChanges};

pub const PREF_DEBUG: &str = "debug";
pub const PREF_GESTURE_BUTTON: &str = "gesture_button";
pub const PREF_BINDINGS: &str = "bindings";

pub const DEFAULT_GESTURE_BUTTON: u8 = buttons::SECONDARY;

/// The subset of preferences the content side acts on. Pushed to every
/// context on attach and whenever a preference changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureSettings {
    pub gesture_button: u8,
    pub debug: bool,
    pub bindings: Bindings,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            gesture_button: DEFAULT_GESTURE_BUTTON,
            debug: false,
            bindings: Bindings::default(),
        }
    }
}

/// In-memory view of the stored preferences, falling back to defaults.
///
/// Writes go to the store only; the local view follows through
/// [`Preferences::apply_changes`] when the store reports the change.
pub struct Preferences {
    defaults: PrefMap,
    values: PrefMap,
    store: Arc<dyn PreferenceStore>,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    pub fn default_prefs() -> PrefMap {
        let mut defaults = PrefMap::new();
        defaults.insert(PREF_DEBUG.into(), Value::Bool(false));
        defaults.insert(PREF_GESTURE_BUTTON.into(), Value::from(DEFAULT_GESTURE_BUTTON));
        defaults.insert(PREF_BINDINGS.into(), Bindings::default().to_json());
        defaults
    }

    /// Read the known preferences from `store` over the defaults.
    pub fn load(store: Arc<dyn PreferenceStore>) -> anyhow::Result<Self> {
        let defaults = Self::default_prefs();
        let keys: Vec<&str> = defaults.keys().map(String::as_str).collect();
        let stored = store.get(&keys)?;
        let mut values = defaults.clone();
        for (key, value) in stored {
            values.insert(key, value);
        }
        let prefs = Self {
            defaults,
            values,
            store,
        };
        let settings = prefs.settings();
        info!(
            gesture_button = settings.gesture_button,
            debug = settings.debug,
            bindings = settings.bindings.len(),
            "Preferences loaded"
        );
        Ok(prefs)
    }

    pub fn get_pref(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set_pref(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut items = PrefMap::new();
        items.insert(key.to_string(), value);
        self.store.set(items)
    }

    /// Drop the stored value so the default applies again.
    pub fn reset_pref(&self, key: &str) -> anyhow::Result<()> {
        self.store.remove(key)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.store.subscribe()
    }

    /// Fold store change notifications into the local view. Removed keys
    /// revert to their default.
    pub fn apply_changes(&mut self, changes: &StorageChanges) {
        for (key, change) in changes {
            match change.new_value.clone().or_else(|| self.defaults.get(key).cloned()) {
                Some(value) => {
                    self.values.insert(key.clone(), value);
                }
                None => {
                    self.values.remove(key);
                }
            }
        }
    }

    /// Also re-reads every key from the store; used after a lagged
    /// notification stream.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        let keys: Vec<&str> = self.defaults.keys().map(String::as_str).collect();
        let stored = self.store.get(&keys)?;
        let mut values = self.defaults.clone();
        for (key, value) in stored {
            values.insert(key, value);
        }
        self.values = values;
        Ok(())
    }

    /// Configured gesture button index; invalid values fall back to the default.
    pub fn gesture_button(&self) -> u8 {
        let raw = self.get_pref(PREF_GESTURE_BUTTON);
        match raw.and_then(Value::as_u64) {
            Some(b) if b <= 4 => b as u8,
            _ => {
                warn!(value = ?raw, "Invalid gesture_button preference, using default");
                DEFAULT_GESTURE_BUTTON
            }
        }
    }

    pub fn debug(&self) -> bool {
        self.get_pref(PREF_DEBUG)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn bindings(&self) -> Bindings {
        match self.get_pref(PREF_BINDINGS).and_then(Bindings::from_json) {
            Some(bindings) => {
                if bindings.is_empty() {
                    warn!("Bindings preference binds nothing, gestures will have no effect");
                }
                bindings
            }
            None => {
                warn!("Invalid bindings preference, using defaults");
                Bindings::default()
            }
        }
    }

    pub fn settings(&self) -> GestureSettings {
        GestureSettings {
            gesture_button: self.gesture_button(),
            debug: self.debug(),
            bindings: self.bindings(),
        }
    }
}
