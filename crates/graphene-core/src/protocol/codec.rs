//! JSON codec for bridge envelopes.
//!
//! Inbound text goes through three gates before it can be routed:
//!
//! ```text
//! text ──parse JSON──▶ Value ──is_valid_envelope──▶ Value ──deserialize──▶ Envelope
//!        CodecError::Json      CodecError::NotEnvelope     CodecError::Malformed
//! ```
//!
//! Receivers discard anything that fails a gate.  None of these failures are
//! reported back to the peer: there is no channel on which to report them.
//!
//! The host's *direct* reply to a content-issued request is interpreted
//! separately by [`parse_reply`], because that text is answered on the same
//! call and has looser rules (an empty reply is a valid `null` result).

use serde_json::Value;
use thiserror::Error;

use crate::protocol::envelope::{error_codes, Envelope, ErrorBody, DEFAULT_ERROR_MESSAGE, BRIDGE_NAME};

/// Message carried by the `invalid_response` failure synthesized by [`parse_reply`].
pub const INVALID_REPLY_MESSAGE: &str = "Bridge returned invalid JSON";

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// The JSON value is not an object whose `bridge` field equals [`BRIDGE_NAME`].
    #[error("not a bridge envelope")]
    NotEnvelope,

    /// The value carries the bridge tag but its fields have the wrong types
    /// (for example a numeric `channel`).
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope could not be serialized.
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Returns `true` only if `raw` is a JSON object whose `bridge` field equals
/// [`BRIDGE_NAME`].
///
/// The protocol version is not checked.
///
/// # Examples
///
/// ```rust
/// use graphene_core::is_valid_envelope;
/// use serde_json::json;
///
/// assert!(is_valid_envelope(&json!({"bridge": "graphene-ui", "kind": "ready"})));
/// assert!(!is_valid_envelope(&json!({"kind": "ready"})));
/// assert!(!is_valid_envelope(&json!(null)));
/// ```
pub fn is_valid_envelope(raw: &Value) -> bool {
    raw.as_object()
        .and_then(|object| object.get("bridge"))
        .and_then(Value::as_str)
        .is_some_and(|tag| tag == BRIDGE_NAME)
}

// ── Encode / decode ───────────────────────────────────────────────────────────

/// Serializes an envelope into its JSON wire form.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if a payload cannot be represented as
/// JSON text (this cannot happen for values built from `serde_json::Value`).
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Serialize)
}

/// Parses and validates inbound envelope text.
///
/// # Errors
///
/// - [`CodecError::Json`] if `text` is not JSON.
/// - [`CodecError::NotEnvelope`] if the value fails [`is_valid_envelope`].
/// - [`CodecError::Malformed`] if the envelope fields have the wrong types.
pub fn decode_inbound(text: &str) -> Result<Envelope, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Json)?;
    decode_value(value)
}

/// Validates an already-parsed JSON value and converts it into an [`Envelope`].
///
/// # Errors
///
/// Same as [`decode_inbound`], minus the JSON parse step.
pub fn decode_value(value: Value) -> Result<Envelope, CodecError> {
    if !is_valid_envelope(&value) {
        return Err(CodecError::NotEnvelope);
    }
    serde_json::from_value(value).map_err(CodecError::Malformed)
}

// ── Direct reply interpretation ───────────────────────────────────────────────

/// Interprets the text the host returned directly from a content-issued
/// request call.
///
/// | Reply text                               | Result                               |
/// |------------------------------------------|--------------------------------------|
/// | empty                                    | `Ok(null)`                           |
/// | not JSON, or JSON that is not an object  | `Err(invalid_response)`              |
/// | object with `"ok": false`                | `Err(error.code / error.message)`    |
/// | any other object                         | `Ok(payload)` (`null` when absent)   |
///
/// The object is not required to carry the bridge tag: the host answers on
/// the same call, so there is no ambiguity about which protocol it speaks.
///
/// # Errors
///
/// Returns the [`ErrorBody`] the requester should surface.
pub fn parse_reply(text: &str) -> Result<Value, ErrorBody> {
    if text.is_empty() {
        return Ok(Value::Null);
    }

    let invalid = || ErrorBody::new(error_codes::INVALID_RESPONSE, INVALID_REPLY_MESSAGE);

    let value: Value = serde_json::from_str(text).map_err(|e| {
        tracing::debug!("failed to parse bridge reply: {e}");
        invalid()
    })?;

    let Value::Object(mut object) = value else {
        return Err(invalid());
    };

    if object.get("ok") == Some(&Value::Bool(false)) {
        let error = object.get("error");
        let field = |name: &str| {
            error
                .and_then(|e| e.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        return Err(ErrorBody {
            code: field("code").unwrap_or_else(|| error_codes::BRIDGE_ERROR.to_string()),
            message: field("message").unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        });
    }

    Ok(object.remove("payload").unwrap_or(Value::Null))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
