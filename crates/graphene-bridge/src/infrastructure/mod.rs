//! Infrastructure layer for graphene-bridge.
//!
//! Concrete collaborators of the application layer:
//!
//! - `config_file` – loading [`BridgeConfig`](crate::domain::BridgeConfig)
//!   from TOML
//! - `loopback`    – an in-process [`HostQuery`](crate::application::HostQuery)
//!   implementation that plays the host's part of the protocol
//!
//! Bindings to a real browser engine implement `HostQuery` in their own crate.

pub mod config_file;
pub mod loopback;

pub use config_file::{load_config, parse_config, ConfigError};
pub use loopback::LoopbackHost;
