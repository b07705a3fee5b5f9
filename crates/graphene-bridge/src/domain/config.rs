//! Bridge configuration types.
//!
//! [`BridgeConfig`] is a plain struct: no global state and no environment
//! reads.  The binary and the config-file loader in the infrastructure layer
//! are responsible for populating it.

use std::time::Duration;

/// Default upper bound on a content-issued request round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default host-visible name of the inbound receiver.
pub const DEFAULT_RECEIVER_NAME: &str = "__grapheneBridgeReceiveFromJava";

/// Default `tracing` filter used by the binary when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// All runtime configuration for one bridge instance.
///
/// # Example
///
/// ```rust
/// use graphene_bridge::domain::BridgeConfig;
/// use std::time::Duration;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.request_timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How long a content-issued request may wait for the host's reply.
    ///
    /// `None` waits forever.  On expiry the call fails locally; the host is
    /// not told and may still finish its work.
    pub request_timeout: Option<Duration>,

    /// Name under which the host finds the inbound receiver.
    pub receiver_name: String,

    /// Fallback log filter for the binary.
    pub log_level: String,
}

impl Default for BridgeConfig {
    /// | Field           | Default                            |
    /// |-----------------|------------------------------------|
    /// | request_timeout | 10 seconds                         |
    /// | receiver_name   | `__grapheneBridgeReceiveFromJava`  |
    /// | log_level       | `info`                             |
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            receiver_name: DEFAULT_RECEIVER_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Returns a copy with a different request timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
