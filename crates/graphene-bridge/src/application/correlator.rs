//! Request correlation in both directions.
//!
//! **Content-issued** requests are answered on the same host call, so no
//! table is needed: the reply text of that call *is* the response.
//!
//! ```text
//! request("app:sum", {a,b})
//!   ├─ id = js-<millis>-<seq>
//!   ├─ send REQUEST ───────────────▶ host
//!   ├─ reply text ◀─────────────────┘
//!   └─ parse_reply: "" → null, junk → invalid_response,
//!                   ok:false → failure, else payload
//! ```
//!
//! **Host-issued** requests arrive through the receiver.  The handler runs on
//! its own task; its outcome is sent back as a separate RESPONSE envelope with
//! the same id, best effort.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use graphene_core::{error_codes, parse_reply, Envelope, RequestIdGenerator};
use serde_json::Value;
use tokio::runtime::Handle;

use crate::application::error::BridgeError;
use crate::application::transport::OutboundTransport;
use crate::domain::{BridgeId, RequestHandler};

/// Issues content-side requests and answers host-side ones.
#[derive(Debug)]
pub(crate) struct Correlator {
    ids: RequestIdGenerator,
    transport: OutboundTransport,
}

impl Correlator {
    pub(crate) fn new(transport: OutboundTransport) -> Self {
        Self {
            ids: RequestIdGenerator::default(),
            transport,
        }
    }

    pub(crate) fn transport(&self) -> &OutboundTransport {
        &self.transport
    }

    /// Sends a REQUEST and interprets the host's direct reply.
    ///
    /// With a `timeout`, the local wait is bounded; the host computation is
    /// not cancelled and its eventual reply is discarded.
    pub(crate) async fn request(
        &self,
        channel: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        let id = self.ids.next_id();
        let envelope = Envelope::request(&id, channel, payload);
        tracing::debug!("sending request id={id} channel={channel}");

        let exchange = async {
            let reply = self.transport.send(&envelope).await?;
            parse_reply(&reply).map_err(BridgeError::Request)
        };

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!("request id={id} channel={channel} timed out after {limit:?}");
                    Err(BridgeError::Timeout(limit))
                }
            },
            None => exchange.await,
        };

        if let Err(e) = &outcome {
            tracing::debug!("request id={id} channel={channel} failed: {e}");
        }
        outcome
    }
}

/// Answers one host-issued request on a spawned task.
///
/// `handler` is the snapshot taken at dispatch time; replacing the channel's
/// handler afterwards does not affect this request.  The task runs on
/// `runtime`, so the caller may be on any thread.
pub(crate) fn answer_host_request(
    runtime: &Handle,
    bridge: BridgeId,
    transport: OutboundTransport,
    request: HostRequest,
    handler: Option<Arc<dyn RequestHandler>>,
) {
    let HostRequest { id, channel, payload } = request;

    runtime.spawn(async move {
        let response = match handler {
            None => {
                tracing::debug!("bridge {bridge}: no handler for host request id={id} channel={channel}");
                Envelope::failure(
                    &id,
                    &channel,
                    error_codes::HANDLER_NOT_FOUND,
                    format!("No JS bridge handler for channel '{channel}'"),
                )
            }
            Some(handler) => {
                let outcome = AssertUnwindSafe(handler.handle(payload)).catch_unwind().await;
                match outcome {
                    Ok(Ok(result)) => Envelope::success(&id, &channel, result),
                    Ok(Err(e)) => {
                        tracing::debug!("bridge {bridge}: handler for channel={channel} failed: {e}");
                        Envelope::failure(&id, &channel, error_codes::HANDLER_ERROR, e.message())
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::debug!("bridge {bridge}: handler for channel={channel} panicked: {message}");
                        Envelope::failure(&id, &channel, error_codes::HANDLER_ERROR, message)
                    }
                }
            }
        };

        transport.send_best_effort(&response).await;
    });
}

/// The fields of a host-issued REQUEST the correlator needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HostRequest {
    pub(crate) id: String,
    pub(crate) channel: String,
    pub(crate) payload: Value,
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
