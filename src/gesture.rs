//! Gesture descriptors emitted by the recognizer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A completed gesture.
///
/// Serialized with a `"subtype"` tag, e.g.
/// `{"subtype": "rocker", "firstButton": 2, "secondButton": 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "lowercase")]
pub enum Gesture {
    /// A second button was pressed while exactly one other was held.
    #[serde(rename_all = "camelCase")]
    Rocker { first_button: u8, second_button: u8 },
    /// The wheel turned while the gesture button was held. `direction` is
    /// `1` for a positive vertical delta and `-1` otherwise.
    Wheel { direction: i8 },
}

impl Gesture {
    /// Build a wheel gesture from a vertical scroll delta.
    pub fn wheel(delta_y: f64) -> Self {
        let direction = if delta_y > 0.0 { 1 } else { -1 };
        Gesture::Wheel { direction }
    }

    pub fn subtype(&self) -> &'static str {
        match self {
            Gesture::Rocker { .. } => "rocker",
            Gesture::Wheel { .. } => "wheel",
        }
    }

    /// Stable identifier used for binding lookups (`"rocker:2,0"`, `"wheel:-1"`).
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Rocker {
                first_button,
                second_button,
            } => write!(f, "rocker:{},{}", first_button, second_button),
            Gesture::Wheel { direction } => write!(f, "wheel:{}", direction),
        }
    }
}

/// Event payload: the descriptor plus its derived id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GestureDetail {
    #[serde(flatten)]
    pub gesture: Gesture,
    pub id: String,
}

impl From<Gesture> for GestureDetail {
    fn from(gesture: Gesture) -> Self {
        Self {
            id: gesture.id(),
            gesture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rocker_id() {
        let g = Gesture::Rocker {
            first_button: 2,
            second_button: 0,
        };
        assert_eq!(g.id(), "rocker:2,0");
        assert_eq!(g.subtype(), "rocker");
    }

    #[test]
    fn wheel_direction_from_delta() {
        assert_eq!(Gesture::wheel(3.0).id(), "wheel:1");
        assert_eq!(Gesture::wheel(-0.5).id(), "wheel:-1");
        // Zero delta counts as "up", same as any non-positive delta.
        assert_eq!(Gesture::wheel(0.0).id(), "wheel:-1");
    }

    #[test]
    fn detail_json_shape() {
        let detail = GestureDetail::from(Gesture::Rocker {
            first_button: 0,
            second_button: 2,
        });
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subtype": "rocker",
                "firstButton": 0,
                "secondButton": 2,
                "id": "rocker:0,2"
            })
        );
    }

    #[test]
    fn wheel_detail_json_shape() {
        let detail = GestureDetail::from(Gesture::wheel(1.0));
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("\"subtype\":\"wheel\""));
        assert!(json.contains("\"direction\":1"));
        assert!(json.contains("\"id\":\"wheel:1\""));
    }
}
