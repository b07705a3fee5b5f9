//! Channel registrations.
//!
//! Two maps keyed by channel name:
//!
//! ```text
//! listeners: "app:tick"  → [ (listener#1, f), (listener#4, g) ]   ordered, many
//! handlers:  "app:echo"  → (generation 3, h)                      at most one
//! ```
//!
//! Removing the last listener of a channel removes the channel entry.  A
//! handler registration carries a generation number so a stale registration
//! (one that has since been replaced) cannot remove its successor.
//!
//! The registry is plain data.  The bridge wraps it in a mutex and only ever
//! holds the lock for the duration of one method call; callbacks are cloned
//! out and invoked after the lock is released.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::handler::{EventListener, RequestHandler};
use crate::domain::ids::ListenerId;

struct HandlerSlot {
    generation: u64,
    handler: Arc<dyn RequestHandler>,
}

/// Listener and handler tables for one bridge.
#[derive(Default)]
pub struct ChannelRegistry {
    next_listener: u64,
    next_generation: u64,
    listeners: HashMap<String, Vec<(ListenerId, EventListener)>>,
    handlers: HashMap<String, HandlerSlot>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Listeners ─────────────────────────────────────────────────────────────

    /// Appends a listener to `channel`; dispatch order is registration order.
    pub fn add_listener(&mut self, channel: &str, listener: EventListener) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners
            .entry(channel.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Removes one listener.  Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, channel: &str, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(channel) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(channel);
        }
        removed
    }

    /// Clones the current listener list for `channel`.
    ///
    /// Dispatch iterates this snapshot, so listeners added or removed while an
    /// event is being delivered take effect from the next event.
    pub fn listeners_for(&self, channel: &str) -> Vec<EventListener> {
        self.listeners
            .get(channel)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners.get(channel).map_or(0, Vec::len)
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    /// Installs `handler` for `channel`, replacing any previous one.
    ///
    /// Returns the new registration's generation and whether a previous
    /// handler was replaced.
    pub fn set_handler(&mut self, channel: &str, handler: Arc<dyn RequestHandler>) -> (u64, bool) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let replaced = self
            .handlers
            .insert(channel.to_string(), HandlerSlot { generation, handler })
            .is_some();
        (generation, replaced)
    }

    /// Removes the handler for `channel` only if it is still the registration
    /// identified by `generation`.
    pub fn remove_handler(&mut self, channel: &str, generation: u64) -> bool {
        match self.handlers.get(channel) {
            Some(slot) if slot.generation == generation => {
                self.handlers.remove(channel);
                true
            }
            _ => false,
        }
    }

    /// The handler currently registered for `channel`.
    pub fn handler_for(&self, channel: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(channel).map(|slot| Arc::clone(&slot.handler))
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    // ── Whole-registry operations ─────────────────────────────────────────────

    /// Every channel with at least one listener or a handler, sorted.
    pub fn channels(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.listeners.keys().chain(self.handlers.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Drops every registration.  Ids keep counting so none is ever reused.
    pub fn clear(&mut self) {
        self.listeners.clear();
        self.handlers.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
