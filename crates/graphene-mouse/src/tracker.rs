//! Installs side button tracking on a bridge and exposes it to content code.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use graphene_bridge::application::{Bridge, HandlerRegistration, Subscription, WeakBridge};
use graphene_bridge::domain::{HandlerError, HandlerResult};
use serde_json::Value;

use crate::state::{is_side_button, MouseButtonEvent, MouseSnapshot, MouseState};
use crate::{MOUSE_BUTTON_CHANNEL, MOUSE_STATE_CHANNEL};

type Observer = Arc<dyn Fn(&MouseButtonEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Identifies one observer registration on a [`MouseTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registrations {
    events: Subscription,
    state: HandlerRegistration,
}

/// Side button tracker bound to one bridge.
///
/// ```rust,no_run
/// use graphene_bridge::application::Bridge;
/// use graphene_bridge::domain::BridgeConfig;
/// use graphene_mouse::{MouseTracker, BUTTON_4};
///
/// let bridge = Bridge::detached(BridgeConfig::default());
/// let mouse = MouseTracker::install(&bridge);
/// mouse.on(|event| {
///     println!("button {} pressed={}", event.button, event.pressed);
///     Ok(())
/// });
/// assert!(!mouse.is_pressed(BUTTON_4));
/// ```
pub struct MouseTracker {
    bridge: WeakBridge,
    state: Mutex<MouseState>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    registrations: Mutex<Option<Registrations>>,
}

impl MouseTracker {
    /// Installs the tracker on `bridge`, or returns the one already there.
    ///
    /// Registers a listener on `graphene:mouse:button` and the handler for
    /// `graphene:mouse:state`.
    pub fn install(bridge: &Bridge) -> Arc<MouseTracker> {
        bridge.get_or_insert_extension(|bridge| {
            let tracker = Arc::new(MouseTracker {
                bridge: bridge.downgrade(),
                state: Mutex::new(MouseState::new()),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
                registrations: Mutex::new(None),
            });

            let weak = Arc::downgrade(&tracker);
            let events = bridge.on(MOUSE_BUTTON_CHANNEL, move |payload| {
                if let Some(tracker) = weak.upgrade() {
                    tracker.on_button_event(payload);
                }
                Ok(())
            });

            let weak = Arc::downgrade(&tracker);
            let state = bridge.handle_fn(MOUSE_STATE_CHANNEL, move |_| {
                let result = snapshot_value(&weak);
                async move { result }
            });

            *tracker.registrations() = Some(Registrations { events, state });
            tracing::debug!("bridge {}: mouse tracker installed", bridge.id());
            tracker
        })
    }

    /// Removes the tracker's bridge registrations.
    ///
    /// Returns `false` if it was already uninstalled, or if the bridge was
    /// shut down since it was installed.  A stale tracker never detaches the
    /// tracker that replaced it.  A later [`install`](Self::install) on the
    /// same bridge creates a fresh tracker.
    pub fn uninstall(&self) -> bool {
        let current = self.is_installed();
        let Some(Registrations { events, state }) = self.registrations().take() else {
            return false;
        };
        events.unsubscribe();
        state.unregister();
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.remove_extension_instance(self);
        }
        current
    }

    /// `true` while this tracker is the one attached to a live bridge.
    ///
    /// Turns `false` after [`uninstall`](Self::uninstall), after
    /// `Bridge::shutdown`, and once the bridge is dropped.
    pub fn is_installed(&self) -> bool {
        if self.registrations().is_none() {
            return false;
        }
        self.bridge
            .upgrade()
            .is_some_and(|bridge| bridge.is_extension_instance(self))
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    /// Calls `observer` for every accepted button change, in registration
    /// order.  Failures and panics are logged and do not reach other
    /// observers.
    pub fn on<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&MouseButtonEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed) + 1);
        self.observers().push((id, Arc::new(observer)));
        id
    }

    /// Removes an observer.  Returns `false` if it was not registered.
    pub fn off(&self, id: ObserverId) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// `true` if `button` coerces to one of the side buttons.
    pub fn is_side_button(&self, button: impl Into<Value>) -> bool {
        is_side_button(button)
    }

    /// `true` if `button` is currently held down.
    pub fn is_pressed(&self, button: impl Into<Value>) -> bool {
        self.state().is_pressed(&button.into())
    }

    pub fn snapshot(&self) -> MouseSnapshot {
        self.state().snapshot()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn on_button_event(&self, payload: &Value) {
        let Some(event) = self.state().apply(payload) else {
            tracing::trace!("ignoring non-side mouse button payload: {payload}");
            return;
        };

        let observers: Vec<Observer> = self.observers().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("mouse observer failed: {e}"),
                Err(_) => tracing::debug!("mouse observer panicked"),
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, MouseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, Vec<(ObserverId, Observer)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registrations(&self) -> MutexGuard<'_, Option<Registrations>> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_value(tracker: &Weak<MouseTracker>) -> HandlerResult {
    let tracker = tracker
        .upgrade()
        .ok_or_else(|| HandlerError::new("mouse tracker is no longer installed"))?;
    Ok(serde_json::to_value(tracker.snapshot())?)
}

impl fmt::Debug for MouseTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MouseTracker")
            .field("installed", &self.is_installed())
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphene_bridge::domain::BridgeConfig;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn tracker() -> (Bridge, Arc<MouseTracker>) {
        let bridge = Bridge::detached(BridgeConfig::default());
        let tracker = MouseTracker::install(&bridge);
        (bridge, tracker)
    }

    #[test]
    fn test_install_registers_listener_and_handler() {
        let (bridge, _tracker) = tracker();
        assert_eq!(bridge.listener_count(MOUSE_BUTTON_CHANNEL), 1);
        assert!(bridge.has_handler(MOUSE_STATE_CHANNEL));
    }

    #[test]
    fn test_install_is_idempotent_per_bridge() {
        // Arrange
        let (bridge, first) = tracker();

        // Act
        let second = MouseTracker::install(&bridge);

        // Assert
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bridge.listener_count(MOUSE_BUTTON_CHANNEL), 1);
    }

    #[test]
    fn test_observers_see_accepted_events_only() {
        let (_bridge, tracker) = tracker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tracker.on(move |event| {
            sink.lock().unwrap().push(*event);
            Ok(())
        });

        tracker.on_button_event(&json!({"button": 1, "pressed": true}));
        tracker.on_button_event(&json!({"button": 4, "pressed": true}));

        assert_eq!(*seen.lock().unwrap(), vec![MouseButtonEvent::new(4, true)]);
    }

    #[test]
    fn test_failing_observer_does_not_stop_others() {
        let (_bridge, tracker) = tracker();
        let calls = Arc::new(AtomicUsize::new(0));
        tracker.on(|_| Err(HandlerError::new("nope")));
        tracker.on(|_| panic!("observer panic"));
        let counter = Arc::clone(&calls);
        tracker.on(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tracker.on_button_event(&json!({"button": 3, "pressed": true}));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshot().event_count, 1);
    }

    #[test]
    fn test_off_removes_observer() {
        let (_bridge, tracker) = tracker();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = tracker.on(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(tracker.off(id));
        assert!(!tracker.off(id));
        tracker.on_button_event(&json!({"button": 3, "pressed": true}));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_uninstall_removes_registrations_and_allows_fresh_install() {
        let (bridge, first) = tracker();

        assert!(first.uninstall());
        assert!(!first.uninstall());
        assert_eq!(bridge.listener_count(MOUSE_BUTTON_CHANNEL), 0);
        assert!(!bridge.has_handler(MOUSE_STATE_CHANNEL));

        let second = MouseTracker::install(&bridge);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_installed());
    }

    #[test]
    fn test_stale_tracker_uninstall_keeps_replacement_attached() {
        // Arrange: a tracker left over from before a shutdown, and its replacement
        let (bridge, stale) = tracker();
        bridge.shutdown();
        let current = MouseTracker::install(&bridge);

        // Act
        let uninstalled = stale.uninstall();
        let again = MouseTracker::install(&bridge);

        // Assert
        assert!(!uninstalled);
        assert!(!stale.is_installed());
        assert!(current.is_installed());
        assert!(Arc::ptr_eq(&current, &again));
        assert_eq!(bridge.listener_count(MOUSE_BUTTON_CHANNEL), 1);
        assert!(bridge.has_handler(MOUSE_STATE_CHANNEL));
    }

    #[test]
    fn test_is_side_button_and_is_pressed_coerce_input() {
        let (_bridge, tracker) = tracker();
        tracker.on_button_event(&json!({"button": "5", "pressed": "yes"}));
        assert!(tracker.is_side_button("5"));
        assert!(tracker.is_pressed(5));
        assert!(tracker.is_pressed("5"));
        assert!(!tracker.is_pressed(6));
    }
}
