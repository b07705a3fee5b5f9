//! # graphene-core
//!
//! Shared protocol library for the Graphene content bridge.
//!
//! The bridge connects a host application to an embedded web-content process
//! through one asymmetric primitive: the content side may issue a one-shot
//! call into the host and receive a single reply, while the host can only push
//! data back by invoking one registered receiver function.  Events, requests,
//! responses and the readiness handshake are all expressed as JSON
//! *envelopes* travelling over that primitive.
//!
//! This crate has no knowledge of transports or runtimes beyond
//! `tokio::sync::oneshot`.  It defines:
//!
//! - **`protocol::envelope`** – the envelope shape, its kinds, error codes and
//!   builder functions.
//! - **`protocol::codec`** – validation, encoding and decoding of envelopes,
//!   and interpretation of the host's direct reply text.
//! - **`protocol::request_id`** – collision-free request id generation
//!   (time component + monotonic counter).
//! - **`protocol::pending`** – the pending-request table an issuer uses to
//!   match out-of-band responses to the requests that caused them.

pub mod protocol;

pub use protocol::codec::{
    decode_inbound, decode_value, encode, is_valid_envelope, parse_reply, CodecError,
};
pub use protocol::envelope::{error_codes, Envelope, ErrorBody, Kind, BRIDGE_NAME, PROTOCOL_VERSION};
pub use protocol::pending::{PendingOutcome, PendingRequests};
pub use protocol::request_id::RequestIdGenerator;
