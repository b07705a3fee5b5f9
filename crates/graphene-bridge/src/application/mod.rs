//! Application layer for graphene-bridge.
//!
//! Orchestrates the protocol: adapts the host primitive to futures, correlates
//! requests with their answers, routes inbound envelopes, and exposes the
//! whole thing through the [`Bridge`] facade.
//!
//! # Modules
//!
//! - `transport`  – [`HostQuery`] trait and the outbound send adapter
//! - `correlator` – content-issued requests and answers to host-issued ones
//! - `router`     – dispatch of validated inbound envelopes by kind
//! - `receiver`   – the entry point the host calls
//! - `bridge`     – the public facade and its lifecycle
//! - `error`      – [`BridgeError`]

pub mod bridge;
mod correlator;
pub mod error;
pub mod receiver;
mod router;
pub mod transport;

pub use bridge::{Bridge, HandlerRegistration, Subscription, WeakBridge};
pub use error::{BridgeError, RequestFailure};
pub use receiver::{Inbound, InboundReceiver};
pub use transport::{Delivery, FnHost, HostQuery, OutboundTransport, QueryCallback, TransportError};
