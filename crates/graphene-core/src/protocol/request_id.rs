//! Request id generation.
//!
//! A request id links a REQUEST to the RESPONSE that answers it.  Ids must be
//! unique among the requests a peer has in flight, and ideally across a
//! content reload too: a stale RESPONSE from before the reload must not match
//! a fresh request that happens to reuse a counter value.
//!
//! Ids therefore combine a wall-clock component with a monotonically
//! increasing counter:
//!
//! ```text
//! js-1718031234567-42
//! ^^ ^^^^^^^^^^^^^ ^^
//! |  |             └─ per-generator sequence (starts at 1)
//! |  └─ milliseconds since the Unix epoch at generation time
//! └─ issuer prefix ("js" for the content process)
//! ```
//!
//! The counter alone guarantees uniqueness within one generator; the time
//! component separates generators created at different times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix used by the content process for the ids it issues.
pub const CONTENT_ID_PREFIX: &str = "js";

/// Thread-safe generator of unique request ids.
///
/// # Examples
///
/// ```rust
/// use graphene_core::RequestIdGenerator;
///
/// let ids = RequestIdGenerator::new("js");
/// let a = ids.next_id();
/// let b = ids.next_id();
/// assert!(a.starts_with("js-"));
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator whose ids start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id of the form `<prefix>-<unix-millis>-<sequence>`.
    pub fn next_id(&self) -> String {
        // `fetch_add` returns the previous value; adding 1 makes the first
        // sequence number 1.  Relaxed ordering is enough: the counter only
        // needs to hand out distinct values.
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        format!("{}-{}-{}", self.prefix, unix_millis(), sequence)
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(CONTENT_ID_PREFIX)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
