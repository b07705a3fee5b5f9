//! Shapes of the callbacks user code registers on a bridge.
//!
//! Two kinds exist:
//!
//! - **Event listeners**: synchronous `Fn(&Value)` closures.  Many may listen
//!   on one channel; each sees every EVENT for that channel.
//! - **Request handlers**: async, one per channel.  The value a handler
//!   resolves to becomes the RESPONSE payload; an error becomes a failed
//!   RESPONSE carrying the error's message.
//!
//! Both return [`HandlerError`] on failure.  The bridge isolates failures (and
//! panics) so one misbehaving callback never stops the others.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a listener or request handler.
///
/// Only the message crosses the wire; the host sees it as the `message` of a
/// `js_handler_error` RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Wraps any displayable error, keeping only its message.
    pub fn from_display(error: impl fmt::Display) -> Self {
        Self::new(error.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_display(error)
    }
}

/// What a request handler resolves to.
pub type HandlerResult = Result<Value, HandlerError>;

/// A registered event listener.
pub type EventListener = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Answers host-issued requests on one channel.
///
/// Implement this directly for stateful handlers, or wrap a closure with
/// [`handler_fn`].
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, payload: Value) -> HandlerResult;
}

/// Adapter turning an async closure into a [`RequestHandler`].
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> HandlerResult {
        (self.f)(payload).await
    }
}

/// Wraps an async closure as a request handler.
///
/// ```rust
/// use graphene_bridge::domain::{handler_fn, RequestHandler};
/// use serde_json::json;
///
/// let echo = handler_fn(|payload| async move { Ok(payload) });
/// let out = tokio_test::block_on(echo.handle(json!({"a": 1})));
/// assert_eq!(out, Ok(json!({"a": 1})));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    #[async_trait]
    impl RequestHandler for Doubler {
        async fn handle(&self, payload: Value) -> HandlerResult {
            let n = payload.as_i64().ok_or("expected a number")?;
            Ok(json!(n * 2))
        }
    }

    #[tokio::test]
    async fn test_trait_impl_handles_payload() {
        assert_eq!(Doubler.handle(json!(21)).await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn test_trait_impl_reports_error_message() {
        let err = Doubler.handle(json!("x")).await.unwrap_err();
        assert_eq!(err.message(), "expected a number");
    }

    #[tokio::test]
    async fn test_handler_fn_wraps_closure() {
        let handler = handler_fn(|p| async move { Ok(json!({"got": p})) });
        assert_eq!(handler.handle(json!(1)).await, Ok(json!({"got": 1})));
    }

    #[test]
    fn test_error_from_serde_keeps_message() {
        let serde_err = serde_json::from_str::<Value>("{").unwrap_err();
        let expected = serde_err.to_string();
        assert_eq!(HandlerError::from(serde_err).message(), expected);
    }

    #[test]
    fn test_error_display_is_message() {
        assert_eq!(HandlerError::new("boom").to_string(), "boom");
    }
}
