//! Gesture-to-action bindings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Something a bound gesture can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    NavigateBack,
    NavigateForward,
    PreviousTab,
    NextTab,
    ZoomImageIn,
    ZoomImageOut,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NavigateBack => "navigateBack",
            Self::NavigateForward => "navigateForward",
            Self::PreviousTab => "previousTab",
            Self::NextTab => "nextTab",
            Self::ZoomImageIn => "zoomImageIn",
            Self::ZoomImageOut => "zoomImageOut",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigateBack" => Ok(Self::NavigateBack),
            "navigateForward" => Ok(Self::NavigateForward),
            "previousTab" => Ok(Self::PreviousTab),
            "nextTab" => Ok(Self::NextTab),
            "zoomImageIn" => Ok(Self::ZoomImageIn),
            "zoomImageOut" => Ok(Self::ZoomImageOut),
            other => Err(format!("Unknown action: '{}'", other)),
        }
    }
}

/// Binding key for the "gesture button pressed" trigger.
pub fn mousedown_key(button: u8) -> String {
    format!("mousedown:{}", button)
}

/// Map from binding key (a gesture id such as `"rocker:2,0"`, or a trigger
/// such as `"mousedown:2"`) to the action it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings(BTreeMap<String, Action>);

impl Bindings {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<Action> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, action: Action) {
        self.0.insert(key.into(), action);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build bindings from a JSON object of key -> action name. Entries whose
    /// value is not a known action name are skipped with a warning.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut bindings = Self::empty();
        for (key, name) in obj {
            match name.as_str().map(Action::from_str) {
                Some(Ok(action)) => bindings.insert(key.clone(), action),
                Some(Err(e)) => warn!(key = %key, "Skipping binding: {}", e),
                None => warn!(key = %key, "Skipping binding: value is not a string"),
            }
        }
        Some(bindings)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, a)| (k.clone(), serde_json::Value::from(a.name())))
                .collect(),
        )
    }
}

impl Default for Bindings {
    fn default() -> Self {
        let mut bindings = Self::empty();
        bindings.insert("rocker:2,0", Action::NavigateBack);
        bindings.insert("rocker:0,2", Action::NavigateForward);
        bindings.insert("wheel:-1", Action::PreviousTab);
        bindings.insert("wheel:1", Action::NextTab);
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_bindings() {
        let b = Bindings::default();
        assert_eq!(b.get("rocker:2,0"), Some(Action::NavigateBack));
        assert_eq!(b.get("rocker:0,2"), Some(Action::NavigateForward));
        assert_eq!(b.get("wheel:-1"), Some(Action::PreviousTab));
        assert_eq!(b.get("wheel:1"), Some(Action::NextTab));
        assert_eq!(b.get("rocker:1,0"), None);
    }

    #[test]
    fn parse_action_names() {
        assert_eq!("zoomImageIn".parse::<Action>(), Ok(Action::ZoomImageIn));
        assert!("zoom".parse::<Action>().is_err());
        assert_eq!(Action::ZoomImageOut.to_string(), "zoomImageOut");
    }

    #[test]
    fn from_json_skips_unknown_actions() {
        let b = Bindings::from_json(&json!({
            "wheel:1": "zoomImageIn",
            "wheel:-1": "explode",
            "rocker:0,1": 7
        }))
        .unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b.get("wheel:1"), Some(Action::ZoomImageIn));
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(Bindings::from_json(&json!(["wheel:1"])).is_none());
    }

    #[test]
    fn json_roundtrip_through_names() {
        let b = Bindings::default();
        assert_eq!(Bindings::from_json(&b.to_json()), Some(b));
    }

    #[test]
    fn trigger_key() {
        assert_eq!(mousedown_key(2), "mousedown:2");
    }
}
