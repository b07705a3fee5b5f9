//! Side button state machine.
//!
//! Event payloads come from the host as loosely typed JSON, so fields are
//! coerced the way a browser script would read them:
//!
//! | Field     | Coercion                                                       |
//! |-----------|----------------------------------------------------------------|
//! | `button`  | numbers as-is, numeric strings parsed, `true`/`false` → 1/0,   |
//! |           | `null` → 0, anything else not a number                         |
//! | `pressed` | truthiness: `false`, `0`, `NaN`, `""`, `null`, absent are false |
//!
//! Only whole numbers in `BUTTON_4..=BUTTON_8` are side buttons; other
//! events are ignored and leave the state untouched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{BUTTON_4, BUTTON_8};

/// One accepted button change, as delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub button: u8,
    pub pressed: bool,
    pub released: bool,
}

impl MouseButtonEvent {
    pub fn new(button: u8, pressed: bool) -> Self {
        Self {
            button,
            pressed,
            released: !pressed,
        }
    }
}

/// Point-in-time view of the tracker, also the `graphene:mouse:state` answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseSnapshot {
    pub event_count: u64,
    pub last_event: Option<MouseButtonEvent>,
    /// Ascending.
    pub pressed_buttons: Vec<u8>,
}

/// Pressed buttons, event count and last event.
#[derive(Debug, Clone, Default)]
pub struct MouseState {
    pressed: BTreeSet<u8>,
    event_count: u64,
    last_event: Option<MouseButtonEvent>,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `graphene:mouse:button` payload.
    ///
    /// Returns the accepted event, or `None` if the button is not a side
    /// button (the state is then unchanged).
    pub fn apply(&mut self, payload: &Value) -> Option<MouseButtonEvent> {
        let button = side_button(payload.get("button"))?;
        let pressed = payload.get("pressed").is_some_and(is_truthy);

        if pressed {
            self.pressed.insert(button);
        } else {
            self.pressed.remove(&button);
        }
        self.event_count += 1;
        let event = MouseButtonEvent::new(button, pressed);
        self.last_event = Some(event);
        Some(event)
    }

    pub fn is_pressed(&self, button: &Value) -> bool {
        side_button(Some(button)).is_some_and(|b| self.pressed.contains(&b))
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn snapshot(&self) -> MouseSnapshot {
        MouseSnapshot {
            event_count: self.event_count,
            last_event: self.last_event,
            // BTreeSet iterates in ascending order.
            pressed_buttons: self.pressed.iter().copied().collect(),
        }
    }
}

/// `true` if `button` coerces to one of the side buttons.
///
/// ```rust
/// use graphene_mouse::is_side_button;
///
/// assert!(is_side_button(3));
/// assert!(is_side_button("7"));
/// assert!(!is_side_button(0));
/// assert!(!is_side_button(8));
/// ```
pub fn is_side_button(button: impl Into<Value>) -> bool {
    side_button(Some(&button.into())).is_some()
}

fn side_button(raw: Option<&Value>) -> Option<u8> {
    let n = to_number(raw?);
    let in_range = n >= f64::from(BUTTON_4) && n <= f64::from(BUTTON_8);
    (in_range && n.fract() == 0.0).then_some(n as u8)
}

/// Numeric coercion; `NaN` when the value has no numeric reading.
pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) => parse_numeric_str(s),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn parse_numeric_str(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts spellings like "inf" and "nan" that a browser would not;
    // none of them can land in the side button range.
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// JS truthiness of a JSON value.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_press_and_release_update_pressed_set() {
        // Arrange
        let mut state = MouseState::new();

        // Act
        state.apply(&json!({"button": 3, "pressed": true}));
        state.apply(&json!({"button": 4, "pressed": true}));
        state.apply(&json!({"button": 3, "pressed": false}));

        // Assert
        let snapshot = state.snapshot();
        assert_eq!(snapshot.pressed_buttons, vec![4]);
        assert_eq!(snapshot.event_count, 3);
        assert_eq!(snapshot.last_event, Some(MouseButtonEvent::new(3, false)));
    }

    #[test]
    fn test_unsupported_buttons_are_ignored() {
        let mut state = MouseState::new();
        for button in [json!(0), json!(2), json!(8), json!(3.5), json!("x"), json!({}), json!([4])] {
            assert_eq!(state.apply(&json!({"button": button, "pressed": true})), None);
        }
        assert_eq!(state.apply(&json!({"pressed": true})), None);
        assert_eq!(state.apply(&json!(5)), None);
        assert_eq!(state.snapshot(), MouseSnapshot::default());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let mut state = MouseState::new();
        let event = state.apply(&json!({"button": " 6 ", "pressed": 1}));
        assert_eq!(event, Some(MouseButtonEvent::new(6, true)));
        assert!(state.is_pressed(&json!(6)));
        assert!(state.is_pressed(&json!("6")));
    }

    #[test]
    fn test_pressed_uses_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(-1)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }

    #[test]
    fn test_missing_pressed_is_release() {
        let mut state = MouseState::new();
        state.apply(&json!({"button": 7, "pressed": true}));
        let event = state.apply(&json!({"button": 7})).unwrap();
        assert!(event.released);
        assert!(state.snapshot().pressed_buttons.is_empty());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(to_number(&json!(null)), 0.0);
        assert_eq!(to_number(&json!(true)), 1.0);
        assert_eq!(to_number(&json!("")), 0.0);
        assert_eq!(to_number(&json!("0x5")), 5.0);
        assert_eq!(to_number(&json!("4.0")), 4.0);
        assert!(to_number(&json!("4px")).is_nan());
    }

    #[test]
    fn test_side_button_range() {
        assert!(!is_side_button(2));
        assert!((3..=7).all(|b| is_side_button(b)));
        assert!(!is_side_button(8));
        assert!(!is_side_button(Value::Null));
    }

    #[test]
    fn test_snapshot_serializes_to_camel_case() {
        let mut state = MouseState::new();
        state.apply(&json!({"button": 5, "pressed": true}));
        state.apply(&json!({"button": 3, "pressed": true}));

        let value = serde_json::to_value(state.snapshot()).unwrap();

        assert_eq!(
            value,
            json!({
                "eventCount": 2,
                "lastEvent": {"button": 3, "pressed": true, "released": false},
                "pressedButtons": [3, 5]
            })
        );
    }

    #[test]
    fn test_empty_snapshot_has_null_last_event() {
        let value = serde_json::to_value(MouseState::new().snapshot()).unwrap();
        assert_eq!(value, json!({"eventCount": 0, "lastEvent": null, "pressedButtons": []}));
    }
}
