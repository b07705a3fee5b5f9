//! The bridge envelope: the only entity that travels on the wire.
//!
//! Every message is a single JSON object.  Two fields identify the protocol
//! (`bridge` and `version`); `kind` selects how the rest of the object is
//! interpreted:
//!
//! ```json
//! {"bridge":"graphene-ui","version":1,"kind":"ready"}
//! {"bridge":"graphene-ui","version":1,"kind":"event","channel":"app:tick","payload":{"n":1}}
//! {"bridge":"graphene-ui","version":1,"kind":"request","id":"js-1700000000000-1","channel":"app:sum","payload":[1,2]}
//! {"bridge":"graphene-ui","version":1,"kind":"response","id":"js-1700000000000-1","channel":"app:sum","ok":true,"payload":3}
//! {"bridge":"graphene-ui","version":1,"kind":"response","id":"java-7","channel":"app:sum","ok":false,"payload":null,
//!  "error":{"code":"handler_not_found","message":"No JS bridge handler for channel 'app:sum'"}}
//! ```
//!
//! # Why one struct instead of an enum per kind?
//!
//! Inbound envelopes come from a peer we do not control and must be tolerated
//! when they carry extra fields, miss optional ones, or use a newer protocol
//! version.  A flat struct with optional fields decodes every plausible shape;
//! routing code then checks only the fields the `kind` requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Discriminator carried in the `bridge` field of every envelope.
///
/// Envelopes with any other value are discarded by the receiver.
pub const BRIDGE_NAME: &str = "graphene-ui";

/// Current protocol version.
///
/// Peers tolerate mismatched versions: the field is informational only.
pub const PROTOCOL_VERSION: u32 = 1;

/// Message used when a failed response omits `error.message`.
pub const DEFAULT_ERROR_MESSAGE: &str = "Bridge request failed";

/// Error codes carried in `error.code` of a failed RESPONSE.
///
/// The set is open: peers must treat codes they do not recognise as generic
/// failures.
pub mod error_codes {
    /// No request handler is registered for the requested channel.
    pub const HANDLER_NOT_FOUND: &str = "handler_not_found";
    /// The content-side request handler failed.
    pub const HANDLER_ERROR: &str = "js_handler_error";
    /// The reply text was not valid JSON or not an envelope-shaped object.
    pub const INVALID_RESPONSE: &str = "invalid_response";
    /// Fallback when a failed response omits `error.code`.
    pub const BRIDGE_ERROR: &str = "bridge_error";
}

static NULL_PAYLOAD: Value = Value::Null;

// ── Kind ──────────────────────────────────────────────────────────────────────

/// Envelope kind, serialized in lowercase (`"event"`, `"request"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Fire-and-forget notification on a channel.
    Event,
    /// A call expecting exactly one RESPONSE with the same `id`.
    Request,
    /// The answer to a REQUEST.
    Response,
    /// Readiness announcement sent once by the content process after install.
    Ready,
    /// Any kind this peer does not understand.  Decoded but never routed.
    #[serde(other)]
    Unknown,
}

impl Kind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Event => "event",
            Kind::Request => "request",
            Kind::Response => "response",
            Kind::Ready => "ready",
            Kind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Error body ────────────────────────────────────────────────────────────────

/// The `error` object of a failed RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable failure code (see [`error_codes`]).
    #[serde(default = "default_error_code")]
    pub code: String,
    /// Human-readable failure description.
    #[serde(default = "default_error_message")]
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body from a code and a message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Default for ErrorBody {
    fn default() -> Self {
        Self::new(error_codes::BRIDGE_ERROR, DEFAULT_ERROR_MESSAGE)
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

fn default_error_code() -> String {
    error_codes::BRIDGE_ERROR.to_string()
}

fn default_error_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}

fn default_version() -> Value {
    Value::from(PROTOCOL_VERSION)
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// One JSON message unit exchanged across the bridge.
///
/// Build outbound envelopes with the constructor functions ([`Envelope::event`],
/// [`Envelope::request`], ...) so the tag, version and payload normalization
/// are always applied.  Inbound envelopes are produced by
/// [`crate::protocol::codec::decode_inbound`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol discriminator; equals [`BRIDGE_NAME`] on valid envelopes.
    pub bridge: String,

    /// Protocol version of the sender.
    ///
    /// Kept as raw JSON: a peer sending `"1"` or `1.5` is still understood.
    #[serde(default = "default_version")]
    pub version: Value,

    /// Selects how the remaining fields are interpreted.
    pub kind: Kind,

    /// Correlation id; present on REQUEST and the matching RESPONSE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Logical topic or endpoint; present on EVENT, REQUEST and RESPONSE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// RESPONSE only: whether the request succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,

    /// Application payload.
    ///
    /// Outbound EVENT/REQUEST/RESPONSE envelopes always carry `Some`, so a
    /// JSON `null` payload is written explicitly.  On decode, `null` and an
    /// absent field both become `None`; use [`Envelope::payload`] to read it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// RESPONSE only, when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    fn base(kind: Kind) -> Self {
        Self {
            bridge: BRIDGE_NAME.to_string(),
            version: Value::from(PROTOCOL_VERSION),
            kind,
            id: None,
            channel: None,
            ok: None,
            payload: None,
            error: None,
        }
    }

    /// Builds the READY announcement.
    pub fn ready() -> Self {
        Self::base(Kind::Ready)
    }

    /// Builds an EVENT envelope.
    pub fn event(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: Some(channel.into()),
            payload: Some(payload),
            ..Self::base(Kind::Event)
        }
    }

    /// Builds a REQUEST envelope.
    pub fn request(id: impl Into<String>, channel: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Some(id.into()),
            channel: Some(channel.into()),
            payload: Some(payload),
            ..Self::base(Kind::Request)
        }
    }

    /// Builds a successful RESPONSE (`ok = true`).
    pub fn success(id: impl Into<String>, channel: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Some(id.into()),
            channel: Some(channel.into()),
            ok: Some(true),
            payload: Some(payload),
            ..Self::base(Kind::Response)
        }
    }

    /// Builds a failed RESPONSE (`ok = false`, `payload = null`).
    pub fn failure(
        id: impl Into<String>,
        channel: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            channel: Some(channel.into()),
            ok: Some(false),
            payload: Some(Value::Null),
            error: Some(ErrorBody::new(code, message)),
            ..Self::base(Kind::Response)
        }
    }

    /// Returns the payload, treating an absent payload as JSON `null`.
    pub fn payload(&self) -> &Value {
        self.payload.as_ref().unwrap_or(&NULL_PAYLOAD)
    }

    /// Consumes the envelope and returns its payload (`null` when absent).
    pub fn into_payload(self) -> Value {
        normalize_payload(self.payload)
    }

    /// `true` if this is a RESPONSE that reports failure.
    ///
    /// Only an explicit `ok: false` counts as failure; a RESPONSE that omits
    /// `ok` is treated as successful.
    pub fn is_failure(&self) -> bool {
        self.ok == Some(false)
    }

    /// The failure details of a failed RESPONSE, with defaults filled in
    /// when the peer omitted the `error` object.
    pub fn error_body(&self) -> ErrorBody {
        self.error.clone().unwrap_or_default()
    }

    /// Channel name, or `""` when absent.
    pub fn channel_str(&self) -> &str {
        self.channel.as_deref().unwrap_or("")
    }
}

/// Maps an absent payload to JSON `null` so the wire never carries "no value".
pub fn normalize_payload(payload: Option<Value>) -> Value {
    payload.unwrap_or(Value::Null)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ready_carries_tag_and_version_only() {
        // Arrange / Act
        let json = serde_json::to_value(Envelope::ready()).unwrap();

        // Assert
        assert_eq!(
            json,
            json!({"bridge": "graphene-ui", "version": 1, "kind": "ready"})
        );
    }

    #[test]
    fn test_event_writes_null_payload_explicitly() {
        let json = serde_json::to_value(Envelope::event("app:tick", Value::Null)).unwrap();
        assert_eq!(json["kind"], "event");
        assert_eq!(json["channel"], "app:tick");
        // The key must be present with a null value, not omitted.
        assert!(json.as_object().unwrap().contains_key("payload"));
        assert!(json["payload"].is_null());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_request_carries_id_and_channel() {
        let json = serde_json::to_value(Envelope::request("js-1-1", "app:sum", json!([1, 2])))
            .unwrap();
        assert_eq!(json["kind"], "request");
        assert_eq!(json["id"], "js-1-1");
        assert_eq!(json["channel"], "app:sum");
        assert_eq!(json["payload"], json!([1, 2]));
        assert!(json.get("ok").is_none());
    }

    #[test]
    fn test_success_response_shape() {
        let json = serde_json::to_value(Envelope::success("java-3", "app:sum", json!(3))).unwrap();
        assert_eq!(json["kind"], "response");
        assert_eq!(json["ok"], true);
        assert_eq!(json["payload"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_response_shape() {
        let json = serde_json::to_value(Envelope::failure(
            "java-4",
            "app:missing",
            error_codes::HANDLER_NOT_FOUND,
            "No JS bridge handler for channel 'app:missing'",
        ))
        .unwrap();
        assert_eq!(json["ok"], false);
        assert!(json["payload"].is_null());
        assert_eq!(json["error"]["code"], "handler_not_found");
        assert_eq!(
            json["error"]["message"],
            "No JS bridge handler for channel 'app:missing'"
        );
    }

    #[test]
    fn test_unknown_kind_decodes_as_unknown() {
        let env: Envelope =
            serde_json::from_value(json!({"bridge": "graphene-ui", "version": 1, "kind": "ping"}))
                .unwrap();
        assert_eq!(env.kind, Kind::Unknown);
    }

    #[test]
    fn test_missing_version_defaults_to_current() {
        let env: Envelope =
            serde_json::from_value(json!({"bridge": "graphene-ui", "kind": "ready"})).unwrap();
        assert_eq!(env.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_non_integer_version_still_decodes() {
        // Arrange
        let versions = [json!("1"), json!(1.5), json!(-3), json!(null), json!({"major": 2})];

        for version in versions {
            // Act
            let env: Envelope = serde_json::from_value(
                json!({"bridge": "graphene-ui", "version": version.clone(), "kind": "event", "channel": "c"}),
            )
            .unwrap();

            // Assert
            assert_eq!(env.kind, Kind::Event);
            assert_eq!(env.version, version);
        }
    }

    #[test]
    fn test_payload_accessor_maps_absent_to_null() {
        let env = Envelope::ready();
        assert!(env.payload().is_null());
        assert!(env.into_payload().is_null());
    }

    #[test]
    fn test_error_body_defaults_when_fields_missing() {
        let env: Envelope = serde_json::from_value(json!({
            "bridge": "graphene-ui", "version": 1, "kind": "response",
            "id": "x", "ok": false, "error": {}
        }))
        .unwrap();
        assert!(env.is_failure());
        assert_eq!(env.error_body(), ErrorBody::default());
    }

    #[test]
    fn test_error_body_defaults_when_object_missing() {
        let env: Envelope = serde_json::from_value(json!({
            "bridge": "graphene-ui", "kind": "response", "id": "x", "ok": false
        }))
        .unwrap();
        assert_eq!(env.error_body().code, error_codes::BRIDGE_ERROR);
        assert_eq!(env.error_body().message, DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_response_without_ok_is_not_failure() {
        let env: Envelope = serde_json::from_value(json!({
            "bridge": "graphene-ui", "kind": "response", "id": "x"
        }))
        .unwrap();
        assert!(!env.is_failure());
    }

    #[test]
    fn test_kind_display_matches_wire_name() {
        assert_eq!(Kind::Event.to_string(), "event");
        assert_eq!(Kind::Request.to_string(), "request");
        assert_eq!(Kind::Response.to_string(), "response");
        assert_eq!(Kind::Ready.to_string(), "ready");
    }

    #[test]
    fn test_error_body_display() {
        let body = ErrorBody::new("js_handler_error", "boom");
        assert_eq!(body.to_string(), "js_handler_error: boom");
    }
}
