//! Errors surfaced to callers of the content-side API.

use std::time::Duration;

use graphene_core::{error_codes, ErrorBody};
use thiserror::Error;

use crate::application::transport::TransportError;

/// A request the host answered with `ok: false`, or whose reply could not be
/// interpreted.
///
/// `code` is one of the `error_codes` constants for failures this protocol
/// defines; any other code is a host-specific failure.
pub type RequestFailure = ErrorBody;

/// Errors returned by [`Bridge`](crate::application::Bridge) operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host call itself failed.  Never retried.
    #[error("bridge transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The host answered, and the answer is a failure.
    #[error("bridge request failed: {0}")]
    Request(RequestFailure),

    /// No reply arrived within the configured time.  The host is not told.
    #[error("bridge request timed out after {0:?}")]
    Timeout(Duration),

    /// The channel name was empty.
    #[error("bridge channel name must not be empty")]
    InvalidChannel,

    /// The payload could not be converted to JSON.
    #[error("failed to serialize bridge payload: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl BridgeError {
    /// The protocol error code, for failures that carry one.
    pub fn code(&self) -> Option<&str> {
        match self {
            BridgeError::Request(failure) => Some(&failure.code),
            _ => None,
        }
    }

    /// `true` if the host has no handler for the requested channel.
    pub fn is_handler_not_found(&self) -> bool {
        self.code() == Some(error_codes::HANDLER_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failure_exposes_code() {
        let err = BridgeError::Request(ErrorBody::new(error_codes::HANDLER_NOT_FOUND, "nope"));
        assert_eq!(err.code(), Some("handler_not_found"));
        assert!(err.is_handler_not_found());
        assert_eq!(err.to_string(), "bridge request failed: handler_not_found: nope");
    }

    #[test]
    fn test_non_request_errors_have_no_code() {
        assert_eq!(BridgeError::InvalidChannel.code(), None);
        assert_eq!(BridgeError::Timeout(Duration::from_millis(5)).code(), None);
        assert_eq!(BridgeError::from(TransportError::Dropped).code(), None);
    }
}
