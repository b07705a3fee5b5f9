//! Domain layer for graphene-bridge.
//!
//! Pure types with no I/O and no runtime: configuration, identities, the
//! shapes of user callbacks, and the channel registry that maps channel names
//! to listeners and handlers.
//!
//! # What does NOT belong here?
//!
//! - Calls into the host primitive (that is the application layer's transport
//!   adapter)
//! - Task spawning, timeouts, or anything that awaits
//! - Reading config files or environment variables

pub mod config;
pub mod handler;
pub mod ids;
pub mod registry;

pub use config::BridgeConfig;
pub use handler::{handler_fn, EventListener, HandlerError, HandlerFn, HandlerResult, RequestHandler};
pub use ids::{BridgeId, ListenerId};
pub use registry::ChannelRegistry;
