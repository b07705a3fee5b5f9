//! In-process host implementation.
//!
//! [`LoopbackHost`] plays the host application's part of the protocol
//! without a browser engine: it answers content-issued queries, can emit
//! events and issue requests into the content side through an attached
//! [`InboundReceiver`], and records every envelope it receives.
//!
//! ```text
//!            HostQuery::query                InboundReceiver::receive
//! Bridge ─────────────────────▶ LoopbackHost ─────────────────────────▶ Bridge
//!        ◀── direct reply text                (events, host requests)
//!
//! host request:  register id in PendingRequests ─▶ receive(REQUEST)
//!                content answers with a RESPONSE query ─▶ complete(id)
//! ```
//!
//! The integration tests and the smoke binary both drive a real [`Bridge`]
//! against this host.
//!
//! [`Bridge`]: crate::application::Bridge

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use graphene_core::{
    decode_inbound, encode, error_codes, Envelope, ErrorBody, Kind, PendingRequests,
    RequestIdGenerator,
};
use serde_json::Value;

use crate::application::receiver::{Inbound, InboundReceiver};
use crate::application::transport::{HostQuery, QueryCallback};

/// Error code the host uses when one of its own handlers fails.
pub const HOST_HANDLER_ERROR: &str = "java_handler_error";

/// Error code for a content request the host cannot route.
pub const INVALID_REQUEST: &str = "invalid_request";

/// Failure code passed to the query callback for unparseable or unknown input.
pub const BAD_QUERY_CODE: i32 = 400;

/// Reply text for queries that carry no result.
const EMPTY_REPLY: &str = "{}";

/// A host-side handler for content-issued requests.
pub type HostHandler = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

#[derive(Default)]
struct HostState {
    handlers: HashMap<String, HostHandler>,
    received: Vec<Envelope>,
    rejection: Option<(i32, String)>,
    receiver: Option<InboundReceiver>,
    ready_count: usize,
}

/// A host application living in the same process as the bridge.
pub struct LoopbackHost {
    state: Mutex<HostState>,
    pending: PendingRequests,
    ids: RequestIdGenerator,
}

impl LoopbackHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HostState::default()),
            pending: PendingRequests::new(),
            ids: RequestIdGenerator::new("java"),
        })
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// Registers a host handler for content-issued requests on `channel`.
    pub fn on_request<F>(&self, channel: &str, handler: F)
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.state().handlers.insert(channel.to_string(), Arc::new(handler));
    }

    /// Gives the host the entry point it pushes data through.
    pub fn attach(&self, receiver: InboundReceiver) {
        tracing::debug!("loopback host: attached receiver '{}'", receiver.name());
        self.state().receiver = Some(receiver);
    }

    /// Makes every following query fail through the failure callback.
    pub fn reject_queries(&self, code: i32, message: impl Into<String>) {
        self.state().rejection = Some((code, message.into()));
    }

    /// Undoes [`reject_queries`](Self::reject_queries).
    pub fn accept_queries(&self) {
        self.state().rejection = None;
    }

    // ── Host → content ────────────────────────────────────────────────────────

    /// Pushes raw input into the content side.
    ///
    /// Returns `false` if no receiver is attached or the input was discarded.
    pub fn push(&self, raw: impl Into<Inbound>) -> bool {
        let receiver = self.state().receiver.clone();
        match receiver {
            Some(receiver) => receiver.receive(raw),
            None => {
                tracing::debug!("loopback host: no receiver attached, dropping push");
                false
            }
        }
    }

    /// Emits an EVENT to the content side.
    pub fn emit(&self, channel: &str, payload: Value) -> bool {
        match encode(&Envelope::event(channel, payload)) {
            Ok(text) => self.push(text),
            Err(e) => {
                tracing::debug!("loopback host: failed to encode event: {e}");
                false
            }
        }
    }

    /// Issues a REQUEST to the content side and waits for its RESPONSE.
    ///
    /// # Errors
    ///
    /// The content side's failure, or a `bridge_error` if the request could
    /// not be delivered, timed out, or was failed by
    /// [`page_changed`](Self::page_changed).
    pub async fn request(&self, channel: &str, payload: Value, timeout: Duration) -> Result<Value, ErrorBody> {
        let id = self.ids.next_id();
        let completion = self.pending.register(&id, channel);

        let delivered = encode(&Envelope::request(&id, channel, payload))
            .map(|text| self.push(text))
            .unwrap_or(false);
        if !delivered {
            self.pending.cancel(&id);
            return Err(ErrorBody::new(error_codes::BRIDGE_ERROR, "Bridge request could not be delivered"));
        }

        match tokio::time::timeout(timeout, completion).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ErrorBody::new(error_codes::BRIDGE_ERROR, "Bridge request was cancelled")),
            Err(_) => {
                self.pending.cancel(&id);
                Err(ErrorBody::new(
                    error_codes::BRIDGE_ERROR,
                    format!("Bridge request timed out after {timeout:?}"),
                ))
            }
        }
    }

    /// Fails every outstanding host-issued request, as the host does when the
    /// content navigates away.  Returns how many were failed.
    pub fn page_changed(&self) -> usize {
        self.state().receiver = None;
        self.pending.fail_all(ErrorBody::new(
            error_codes::BRIDGE_ERROR,
            "Bridge page changed before a response was received",
        ))
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    /// Every valid envelope received so far, in arrival order.
    pub fn received(&self) -> Vec<Envelope> {
        self.state().received.clone()
    }

    /// Received envelopes of one kind.
    pub fn received_of(&self, kind: Kind) -> Vec<Envelope> {
        self.state()
            .received
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// How many READY announcements arrived.
    pub fn ready_count(&self) -> usize {
        self.state().ready_count
    }

    /// Host-issued requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ── Query handling ────────────────────────────────────────────────────────

    fn answer_request(&self, envelope: &Envelope) -> String {
        let Some(id) = envelope.id.as_deref().filter(|id| !id.is_empty()) else {
            return reply(&Envelope {
                id: None,
                ..Envelope::failure("", envelope.channel_str(), INVALID_REQUEST, "Bridge request is missing id")
            });
        };
        let channel = envelope.channel_str();
        if channel.is_empty() {
            return reply(&Envelope {
                channel: None,
                ..Envelope::failure(id, "", INVALID_REQUEST, "Bridge request is missing channel")
            });
        }

        let handler = self.state().handlers.get(channel).cloned();
        let response = match handler {
            None => Envelope::failure(
                id,
                channel,
                error_codes::HANDLER_NOT_FOUND,
                format!("No Java bridge handler for channel '{channel}'"),
            ),
            Some(handler) => match handler(envelope.payload().clone()) {
                Ok(result) => Envelope::success(id, channel, result),
                Err(message) => Envelope::failure(id, channel, HOST_HANDLER_ERROR, message),
            },
        };
        reply(&response)
    }
}

impl HostQuery for LoopbackHost {
    fn query(&self, request: String, callback: QueryCallback) {
        if let Some((code, message)) = self.state().rejection.clone() {
            callback.failure(code, message);
            return;
        }

        let envelope = match decode_inbound(&request) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("loopback host: rejecting query: {e}");
                callback.failure(BAD_QUERY_CODE, "Bridge message could not be parsed");
                return;
            }
        };

        {
            let mut state = self.state();
            state.received.push(envelope.clone());
            if envelope.kind == Kind::Ready {
                state.ready_count += 1;
            }
        }

        match envelope.kind {
            Kind::Ready | Kind::Event => callback.success(EMPTY_REPLY),
            Kind::Request => callback.success(self.answer_request(&envelope)),
            Kind::Response => {
                callback.success(EMPTY_REPLY);
                self.pending.complete(&envelope);
            }
            Kind::Unknown => callback.failure(BAD_QUERY_CODE, "Unknown bridge message kind"),
        }
    }
}

fn reply(envelope: &Envelope) -> String {
    // Encoding a value-only envelope cannot fail; an empty reply reads as null.
    encode(envelope).unwrap_or_default()
}
