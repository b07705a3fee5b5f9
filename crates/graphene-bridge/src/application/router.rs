//! Routes validated inbound envelopes by kind.
//!
//! | Kind       | Action                                                     |
//! |------------|------------------------------------------------------------|
//! | `event`    | every listener on the channel, in registration order       |
//! | `request`  | the channel's handler, on a spawned task (see correlator)  |
//! | `response` | nothing: the content side has no out-of-band requests      |
//! | `ready`    | nothing: only the content side announces readiness         |
//! | unknown    | nothing                                                    |
//!
//! Registry locks are released before any user callback runs.

use std::panic::{catch_unwind, AssertUnwindSafe};

use graphene_core::{Envelope, Kind};

use crate::application::bridge::BridgeInner;
use crate::application::correlator::{answer_host_request, panic_message, HostRequest};

pub(crate) fn dispatch(inner: &BridgeInner, envelope: Envelope) {
    let bridge = inner.id;
    match envelope.kind {
        Kind::Event => {
            let Some(channel) = envelope.channel.as_deref() else {
                tracing::debug!("bridge {bridge}: dropping event without channel");
                return;
            };
            let listeners = inner.registry().listeners_for(channel);
            if listeners.is_empty() {
                tracing::trace!("bridge {bridge}: no listeners for event channel={channel}");
                return;
            }
            let payload = envelope.payload();
            for listener in listeners {
                match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!("bridge {bridge}: listener on channel={channel} failed: {e}");
                    }
                    Err(panic) => {
                        tracing::debug!(
                            "bridge {bridge}: listener on channel={channel} panicked: {}",
                            panic_message(panic.as_ref())
                        );
                    }
                }
            }
        }

        Kind::Request => {
            let Some(id) = envelope.id.clone() else {
                tracing::debug!("bridge {bridge}: dropping host request without id");
                return;
            };
            let channel = envelope.channel_str().to_string();
            let Some(runtime) = inner.runtime() else {
                tracing::warn!("bridge {bridge}: no tokio runtime, dropping host request id={id} channel={channel}");
                return;
            };
            let handler = inner.registry().handler_for(&channel);
            let request = HostRequest {
                id,
                channel,
                payload: envelope.into_payload(),
            };
            answer_host_request(&runtime, bridge, inner.correlator.transport().clone(), request, handler);
        }

        Kind::Response => {
            tracing::debug!(
                "bridge {bridge}: ignoring response id={} with no pending request",
                envelope.id.as_deref().unwrap_or("<none>")
            );
        }

        Kind::Ready | Kind::Unknown => {
            tracing::debug!("bridge {bridge}: ignoring inbound {} envelope", envelope.kind);
        }
    }
}
