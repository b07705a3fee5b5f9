//! Outbound transport adapter.
//!
//! The host exposes a single asynchronous one-shot call: the content side
//! hands it a request string plus a pair of callbacks, and exactly one of them
//! fires later with the reply text or a failure.  This module models that
//! primitive as the [`HostQuery`] trait and adapts it to a future:
//!
//! ```text
//! send(envelope)
//!   │ encode
//!   ▼
//! HostQuery::query(text, QueryCallback) ──host──▶ callback.success(reply)
//!   │                                             callback.failure(code, msg)
//!   ▼                                             (or callback dropped)
//! await oneshot ─▶ Ok(reply) / Err(TransportError)
//! ```
//!
//! [`QueryCallback`] is consumed by whichever completion the host calls, so a
//! host implementation cannot answer twice.

use std::fmt;
use std::sync::Arc;

use graphene_core::{encode, CodecError, Envelope};
use thiserror::Error;
use tokio::sync::oneshot;

/// Failures of the host call itself, as opposed to failures reported inside a
/// reply envelope.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No host primitive is available (the bridge is running outside a host).
    #[error("host query primitive is unavailable")]
    Unavailable,

    /// The host invoked the failure callback.
    #[error("host rejected the query ({code}): {message}")]
    Rejected { code: i32, message: String },

    /// The host dropped the callback without answering.
    #[error("host dropped the query without answering")]
    Dropped,

    /// The envelope could not be turned into request text.
    #[error("failed to encode outbound envelope: {0}")]
    Encode(#[source] CodecError),
}

type QueryResult = Result<String, TransportError>;

/// Single-use completion handed to the host with every query.
pub struct QueryCallback {
    completion: oneshot::Sender<QueryResult>,
}

impl QueryCallback {
    /// Creates a callback and the receiver that observes its completion.
    pub fn channel() -> (Self, oneshot::Receiver<QueryResult>) {
        let (completion, rx) = oneshot::channel();
        (Self { completion }, rx)
    }

    /// Answers the query with reply text.
    pub fn success(self, response: impl Into<String>) {
        let _ = self.completion.send(Ok(response.into()));
    }

    /// Fails the query.
    pub fn failure(self, code: i32, message: impl Into<String>) {
        let _ = self.completion.send(Err(TransportError::Rejected {
            code,
            message: message.into(),
        }));
    }
}

impl fmt::Debug for QueryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCallback").finish_non_exhaustive()
    }
}

/// The host's one-shot query primitive.
///
/// Implementations must eventually call exactly one of
/// [`QueryCallback::success`] or [`QueryCallback::failure`], from any thread,
/// either before `query` returns or later.  Dropping the callback unanswered
/// surfaces as [`TransportError::Dropped`].
#[cfg_attr(test, mockall::automock)]
pub trait HostQuery: Send + Sync {
    fn query(&self, request: String, callback: QueryCallback);
}

/// Adapter for hosts that expose the primitive as a plain closure.
pub struct FnHost<F>(pub F);

impl<F> HostQuery for FnHost<F>
where
    F: Fn(String, QueryCallback) + Send + Sync,
{
    fn query(&self, request: String, callback: QueryCallback) {
        (self.0)(request, callback)
    }
}

/// Outcome of a best-effort send.
///
/// Events, the READY announcement and responses to host-issued requests are
/// fire-and-forget: nobody is waiting for them locally, so a failure is
/// logged and reported here rather than raised.
#[derive(Debug)]
pub enum Delivery {
    Delivered,
    Suppressed(TransportError),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Sends envelopes through the host primitive.
#[derive(Clone)]
pub struct OutboundTransport {
    host: Option<Arc<dyn HostQuery>>,
}

impl OutboundTransport {
    pub fn new(host: Arc<dyn HostQuery>) -> Self {
        Self { host: Some(host) }
    }

    /// A transport with no host behind it; every send fails with
    /// [`TransportError::Unavailable`].
    pub fn unavailable() -> Self {
        Self { host: None }
    }

    pub fn is_available(&self) -> bool {
        self.host.is_some()
    }

    /// Sends one envelope and waits for the host's reply text.
    ///
    /// The host primitive is invoked exactly once.  There is no retry.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] variant; see its documentation.
    pub async fn send(&self, envelope: &Envelope) -> Result<String, TransportError> {
        let host = self.host.as_ref().ok_or(TransportError::Unavailable)?;
        let request = encode(envelope).map_err(TransportError::Encode)?;
        let (callback, reply) = QueryCallback::channel();
        host.query(request, callback);
        reply.await.unwrap_or(Err(TransportError::Dropped))
    }

    /// Sends one envelope, swallowing any failure.
    pub async fn send_best_effort(&self, envelope: &Envelope) -> Delivery {
        match self.send(envelope).await {
            Ok(_) => Delivery::Delivered,
            Err(e) => {
                tracing::debug!(
                    "suppressed {} send failure on channel '{}': {e}",
                    envelope.kind,
                    envelope.channel_str()
                );
                Delivery::Suppressed(e)
            }
        }
    }
}

impl fmt::Debug for OutboundTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundTransport")
            .field("available", &self.is_available())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use graphene_core::{decode_inbound, Kind};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_invokes_host_exactly_once_and_returns_reply() {
        // Arrange
        let mut host = MockHostQuery::new();
        host.expect_query()
            .times(1)
            .returning(|request, callback| {
                let env = decode_inbound(&request).unwrap();
                assert_eq!(env.kind, Kind::Event);
                callback.success("{}");
            });
        let transport = OutboundTransport::new(Arc::new(host));

        // Act
        let reply = transport.send(&Envelope::event("c", json!(1))).await;

        // Assert
        assert_eq!(reply.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_host_failure_callback_is_rejected_error() {
        let mut host = MockHostQuery::new();
        host.expect_query()
            .returning(|_, callback| callback.failure(-3, "renderer gone"));
        let transport = OutboundTransport::new(Arc::new(host));

        let err = transport.send(&Envelope::ready()).await.unwrap_err();

        assert!(matches!(
            err,
            TransportError::Rejected { code: -3, ref message } if message == "renderer gone"
        ));
    }

    #[tokio::test]
    async fn test_dropped_callback_is_dropped_error() {
        let mut host = MockHostQuery::new();
        host.expect_query().returning(|_, callback| drop(callback));
        let transport = OutboundTransport::new(Arc::new(host));

        let err = transport.send(&Envelope::ready()).await.unwrap_err();

        assert!(matches!(err, TransportError::Dropped));
    }

    #[tokio::test]
    async fn test_unavailable_transport_never_calls_host() {
        let transport = OutboundTransport::unavailable();
        let err = transport.send(&Envelope::ready()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable));
        assert!(!transport.is_available());
    }

    #[tokio::test]
    async fn test_host_may_answer_from_another_thread() {
        let host = FnHost(|_request: String, callback: QueryCallback| {
            std::thread::spawn(move || callback.success("late"));
        });
        let transport = OutboundTransport::new(Arc::new(host));

        assert_eq!(transport.send(&Envelope::ready()).await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_best_effort_reports_suppressed_failure() {
        let delivery = OutboundTransport::unavailable()
            .send_best_effort(&Envelope::event("c", json!(null)))
            .await;
        assert!(!delivery.is_delivered());
        assert!(matches!(delivery, Delivery::Suppressed(TransportError::Unavailable)));
    }
}
