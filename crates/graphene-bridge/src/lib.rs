//! graphene-bridge library crate.
//!
//! The content-process half of the Graphene host bridge.  Content code uses a
//! [`Bridge`](application::Bridge) to emit events to the host, send requests
//! and await their answers, and register listeners and handlers for what the
//! host sends back.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! content code
//!      ↕  emit / request / on / off / handle
//! [graphene-bridge]
//!   ├── domain/          Config, ids, callback types, channel registry
//!   ├── application/     Transport adapter, correlator, router, receiver, Bridge
//!   └── infrastructure/
//!         ├── config_file/ TOML config loading
//!         └── loopback/    In-process host for tests and the smoke binary
//!      ↕  HostQuery (one-shot call)  /  InboundReceiver::receive
//! host application
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O and never awaits.
//! - `application` depends on `domain` and `graphene-core`; it reaches the
//!   host only through the [`HostQuery`](application::HostQuery) trait.
//! - `infrastructure` provides concrete hosts and file loading.
//!
//! # For beginners: why a trait for the host?
//!
//! The real host primitive lives in a browser engine binding that tests
//! cannot load.  Hiding it behind `HostQuery` lets the unit tests substitute
//! a `mockall` mock, and the integration tests a complete in-process host.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: protocol orchestration and the public `Bridge` API.
pub mod application;

/// Infrastructure layer: config files and the loopback host.
pub mod infrastructure;
