//! Protocol module containing the envelope types, codec and correlation helpers.

pub mod codec;
pub mod envelope;
pub mod pending;
pub mod request_id;

pub use codec::{decode_inbound, decode_value, encode, is_valid_envelope, parse_reply, CodecError};
pub use envelope::*;
pub use pending::{PendingOutcome, PendingRequests};
pub use request_id::RequestIdGenerator;
