//! # graphene-mouse
//!
//! Tracks the side buttons of the mouse (buttons 4 to 8) inside the content
//! process.  The host reports presses and releases as bridge events; this
//! crate keeps the set of pressed buttons, counts events, notifies local
//! observers, and answers the host's state queries.
//!
//! ```text
//! host ── EVENT graphene:mouse:button {button, pressed} ──▶ MouseTracker
//! host ── REQUEST graphene:mouse:state ──▶ MouseTracker::snapshot()
//!          ◀── {eventCount, lastEvent, pressedButtons}
//! ```
//!
//! - **`state`**   – the pure state machine and JS-compatible value coercion
//! - **`tracker`** – installation on a [`Bridge`](graphene_bridge::application::Bridge)
//!   and the observer API

pub mod state;
pub mod tracker;

pub use state::{is_side_button, MouseButtonEvent, MouseSnapshot, MouseState};
pub use tracker::{MouseTracker, ObserverId};

/// Event channel the host reports side button changes on.
pub const MOUSE_BUTTON_CHANNEL: &str = "graphene:mouse:button";

/// Request channel the host queries the current state on.
pub const MOUSE_STATE_CHANNEL: &str = "graphene:mouse:state";

/// Zero-based button numbers as reported by the host.
pub const BUTTON_4: u8 = 3;
pub const BUTTON_5: u8 = 4;
pub const BUTTON_6: u8 = 5;
pub const BUTTON_7: u8 = 6;
pub const BUTTON_8: u8 = 7;
