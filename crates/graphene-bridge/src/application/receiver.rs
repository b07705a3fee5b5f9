//! The entry point the host invokes to push data into the content side.
//!
//! The host only ever sees a named function taking one argument.  Whatever it
//! passes is parsed leniently: text that is not JSON, JSON that is not a
//! bridge envelope, and envelopes with mistyped fields are all logged at
//! `debug` and discarded.  Nothing is reported back: there is no
//! channel to report on.

use std::sync::Weak;

use graphene_core::{decode_inbound, decode_value, Envelope};
use serde_json::Value;

use crate::application::bridge::BridgeInner;
use crate::application::router;

/// Raw input handed to [`InboundReceiver::receive`].
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// JSON text, the usual form when the host calls across a process boundary.
    Text(String),
    /// An already-parsed value.
    Value(Value),
}

impl From<&str> for Inbound {
    fn from(text: &str) -> Self {
        Inbound::Text(text.to_string())
    }
}

impl From<String> for Inbound {
    fn from(text: String) -> Self {
        Inbound::Text(text)
    }
}

impl From<Value> for Inbound {
    fn from(value: Value) -> Self {
        Inbound::Value(value)
    }
}

/// Handle the host calls to deliver inbound envelopes.
///
/// Obtained from [`Bridge::install`](crate::application::Bridge::install).
/// A receiver is bound to one installation: after
/// [`Bridge::shutdown`](crate::application::Bridge::shutdown), or once the
/// bridge is dropped, it silently ignores everything.
///
/// `receive` may be called from any thread.  Host-issued requests are
/// answered on tasks spawned onto the runtime the bridge was installed on.
#[derive(Debug, Clone)]
pub struct InboundReceiver {
    bridge: Weak<BridgeInner>,
    installation: u64,
    name: String,
}

impl InboundReceiver {
    pub(crate) fn new(bridge: Weak<BridgeInner>, installation: u64, name: String) -> Self {
        Self {
            bridge,
            installation,
            name,
        }
    }

    /// Host-visible name of this entry point.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` while the installation this receiver belongs to is current.
    pub fn is_live(&self) -> bool {
        self.bridge
            .upgrade()
            .is_some_and(|inner| inner.is_current_installation(self.installation))
    }

    /// Parses, validates and routes one inbound envelope.
    ///
    /// Returns `true` if the input was a valid envelope and was routed.
    pub fn receive(&self, raw: impl Into<Inbound>) -> bool {
        let Some(inner) = self.bridge.upgrade() else {
            tracing::debug!("receiver '{}': bridge is gone, ignoring input", self.name);
            return false;
        };
        if !inner.is_current_installation(self.installation) {
            tracing::debug!("bridge {}: receiver from a previous installation ignored", inner.id);
            return false;
        }

        let Some(envelope) = parse(raw.into()) else {
            return false;
        };
        router::dispatch(&inner, envelope);
        true
    }
}

fn parse(raw: Inbound) -> Option<Envelope> {
    let decoded = match raw {
        Inbound::Text(text) => decode_inbound(&text),
        Inbound::Value(value) => decode_value(value),
    };
    decoded
        .map_err(|e| tracing::debug!("discarding inbound bridge message: {e}"))
        .ok()
}
