//! Pending-request table for the side that issues out-of-band requests.
//!
//! When the host sends a REQUEST by invoking the content receiver, nothing is
//! returned on that call.  The answer arrives later as a separate RESPONSE
//! envelope on the host's inbound endpoint, possibly out of order with other
//! answers.  The issuer therefore keeps a table of requests it is still
//! waiting for, keyed by request id:
//!
//! ```text
//! register("java-7") ──▶ { "java-7" → oneshot::Sender }      (rx returned to caller)
//! RESPONSE id=java-7 ──▶ complete() removes entry, sends the outcome
//! RESPONSE id=java-7 ──▶ complete() finds nothing: late or duplicate, ignored
//! ```
//!
//! A response whose id is not in the table is dropped silently.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::protocol::envelope::{Envelope, ErrorBody, Kind};

/// The settled result of a pending request.
pub type PendingOutcome = Result<Value, ErrorBody>;

#[derive(Debug)]
struct PendingEntry {
    channel: String,
    completion: oneshot::Sender<PendingOutcome>,
}

/// Table of requests awaiting a RESPONSE, keyed by request id.
///
/// Each entry is settled at most once: by a matching RESPONSE, by
/// [`cancel`](Self::cancel) (for example on a local timeout), or by
/// [`fail_all`](Self::fail_all).
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and returns the receiver that resolves when it
    /// settles.
    ///
    /// Registering an id that is already pending replaces the older entry;
    /// the older receiver then observes a closed channel.
    pub fn register(
        &self,
        id: impl Into<String>,
        channel: impl Into<String>,
    ) -> oneshot::Receiver<PendingOutcome> {
        let (completion, rx) = oneshot::channel();
        let id = id.into();
        let channel = channel.into();
        tracing::debug!("registered pending request id={id} channel={channel}");
        self.lock().insert(id, PendingEntry { channel, completion });
        rx
    }

    /// Settles the pending request matching a RESPONSE envelope.
    ///
    /// Returns `false`, without side effects, if the envelope is not a
    /// RESPONSE, carries no id, or its id is unknown or already settled.
    pub fn complete(&self, response: &Envelope) -> bool {
        if response.kind != Kind::Response {
            return false;
        }
        let Some(id) = response.id.as_deref() else {
            return false;
        };
        let Some(entry) = self.lock().remove(id) else {
            tracing::debug!("ignoring response for unknown request id={id}");
            return false;
        };

        let outcome = if response.is_failure() {
            Err(response.error_body())
        } else {
            Ok(response.payload().clone())
        };
        tracing::debug!(
            "settled pending request id={id} channel={} ok={}",
            entry.channel,
            outcome.is_ok()
        );
        // The requester may have stopped waiting; that is not an error.
        let _ = entry.completion.send(outcome);
        true
    }

    /// Removes a pending request without settling it.
    ///
    /// The receiver observes a closed channel.  Returns `false` if the id was
    /// not pending.
    pub fn cancel(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Fails every pending request with the same error and empties the table.
    ///
    /// Used when the content process reloads or the bridge closes: no
    /// outstanding response can arrive any more.
    pub fn fail_all(&self, error: ErrorBody) -> usize {
        let drained: Vec<PendingEntry> = self.lock().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.completion.send(Err(error.clone()));
        }
        if count > 0 {
            tracing::debug!("failed {count} pending request(s): {error}");
        }
        count
    }

    /// `true` if `id` is still waiting for a response.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of requests still waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if no request is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        // The map holds no invariant a panicking holder could break half-way.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::error_codes;
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;

    #[test]
    fn test_success_response_settles_matching_request() {
        // Arrange
        let table = PendingRequests::new();
        let mut rx = table.register("java-1", "app:echo");

        // Act
        let matched = table.complete(&Envelope::success("java-1", "app:echo", json!({"a": 1})));

        // Assert
        assert!(matched);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!({"a": 1})));
        assert!(table.is_empty());
    }

    #[test]
    fn test_failure_response_settles_with_error_body() {
        let table = PendingRequests::new();
        let mut rx = table.register("java-2", "app:x");

        table.complete(&Envelope::failure(
            "java-2",
            "app:x",
            error_codes::HANDLER_ERROR,
            "boom",
        ));

        assert_eq!(
            rx.try_recv().unwrap(),
            Err(ErrorBody::new("js_handler_error", "boom"))
        );
    }

    #[test]
    fn test_unknown_id_is_a_no_op() {
        // Arrange
        let table = PendingRequests::new();
        let mut rx = table.register("java-3", "app:x");

        // Act
        let matched = table.complete(&Envelope::success("java-999", "app:x", json!(1)));

        // Assert: nothing settled, nothing removed
        assert!(!matched);
        assert_eq!(table.len(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_duplicate_response_is_ignored() {
        let table = PendingRequests::new();
        let _rx = table.register("java-4", "app:x");

        assert!(table.complete(&Envelope::success("java-4", "app:x", json!(1))));
        assert!(!table.complete(&Envelope::success("java-4", "app:x", json!(2))));
    }

    #[test]
    fn test_non_response_kinds_are_ignored() {
        let table = PendingRequests::new();
        let _rx = table.register("java-5", "app:x");

        assert!(!table.complete(&Envelope::request("java-5", "app:x", json!(null))));
        assert!(table.contains("java-5"));
    }

    #[test]
    fn test_fail_all_rejects_every_pending_request() {
        // Arrange
        let table = PendingRequests::new();
        let mut a = table.register("a", "c");
        let mut b = table.register("b", "c");

        // Act
        let failed = table.fail_all(ErrorBody::new("bridge_error", "Bridge closed"));

        // Assert
        assert_eq!(failed, 2);
        assert!(table.is_empty());
        assert_eq!(a.try_recv().unwrap().unwrap_err().message, "Bridge closed");
        assert_eq!(b.try_recv().unwrap().unwrap_err().message, "Bridge closed");
    }

    #[test]
    fn test_cancel_closes_receiver() {
        let table = PendingRequests::new();
        let mut rx = table.register("a", "c");

        assert!(table.cancel("a"));
        assert!(!table.cancel("a"));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[test]
    fn test_completion_after_receiver_dropped_does_not_panic() {
        let table = PendingRequests::new();
        drop(table.register("a", "c"));
        assert!(table.complete(&Envelope::success("a", "c", json!(null))));
    }

    #[tokio::test]
    async fn test_out_of_order_responses_settle_by_id() {
        // Arrange
        let table = PendingRequests::new();
        let first = table.register("first", "c");
        let second = table.register("second", "c");

        // Act: answer the second request before the first
        table.complete(&Envelope::success("second", "c", json!(2)));
        table.complete(&Envelope::success("first", "c", json!(1)));

        // Assert
        assert_eq!(first.await.unwrap(), Ok(json!(1)));
        assert_eq!(second.await.unwrap(), Ok(json!(2)));
    }
}
