//! The content-side bridge facade.
//!
//! A [`Bridge`] owns everything one content view needs: the channel registry,
//! the request correlator and the transport adapter.  It is cheap to clone
//! (an `Arc` inside) and independent instances never share state, so several
//! content views can each run their own bridge in the same process.
//!
//! # Lifecycle
//!
//! ```text
//! Bridge::new ──▶ install() ──▶ READY sent once, receiver handed to host
//!                    │
//!                    ├── install() again: same installation, no READY
//!                    ▼
//!                 shutdown() ──▶ registrations cleared, receiver goes stale
//!                    │
//!                    ▼
//!                 install() ──▶ new installation, READY sent again
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use graphene_core::{error_codes, Envelope, ErrorBody};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::application::correlator::Correlator;
use crate::application::error::BridgeError;
use crate::application::receiver::InboundReceiver;
use crate::application::transport::{Delivery, HostQuery, OutboundTransport};
use crate::domain::{
    handler_fn, BridgeConfig, BridgeId, ChannelRegistry, HandlerError, HandlerResult, ListenerId,
    RequestHandler,
};

type Extension = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Default)]
struct Lifecycle {
    installed: bool,
    installation: u64,
}

/// Shared state behind every clone of a [`Bridge`].
pub(crate) struct BridgeInner {
    pub(crate) id: BridgeId,
    config: BridgeConfig,
    registry: Mutex<ChannelRegistry>,
    pub(crate) correlator: Correlator,
    lifecycle: Mutex<Lifecycle>,
    extensions: Mutex<HashMap<TypeId, Extension>>,
    /// Runtime that host-issued requests and READY announcements are spawned
    /// on.  The host may call the receiver from a thread outside any runtime.
    runtime: Mutex<Option<Handle>>,
}

impl BridgeInner {
    pub(crate) fn registry(&self) -> MutexGuard<'_, ChannelRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn extensions(&self) -> MutexGuard<'_, HashMap<TypeId, Extension>> {
        self.extensions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The captured runtime, or the caller's if none was captured yet.
    pub(crate) fn runtime(&self) -> Option<Handle> {
        let captured = self.runtime.lock().unwrap_or_else(PoisonError::into_inner).clone();
        captured.or_else(|| Handle::try_current().ok())
    }

    fn capture_runtime(&self) {
        if let Ok(handle) = Handle::try_current() {
            *self.runtime.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
    }

    pub(crate) fn is_current_installation(&self, installation: u64) -> bool {
        let lifecycle = self.lifecycle();
        lifecycle.installed && lifecycle.installation == installation
    }
}

/// Content-side endpoint of the host bridge.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use graphene_bridge::application::{Bridge, FnHost, QueryCallback};
/// use graphene_bridge::domain::BridgeConfig;
/// use serde_json::json;
///
/// # async fn run() -> Result<(), graphene_bridge::application::BridgeError> {
/// let host = FnHost(|_request: String, callback: QueryCallback| callback.success(""));
/// let bridge = Bridge::new(BridgeConfig::default(), Arc::new(host));
/// let receiver = bridge.install().await;
///
/// bridge.on("app:tick", |payload| {
///     println!("tick {payload}");
///     Ok(())
/// });
/// let sum = bridge.request("app:sum", json!({"a": 1, "b": 2})).await?;
/// # let _ = (receiver, sum);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Creates a bridge that talks to `host`.
    pub fn new(config: BridgeConfig, host: Arc<dyn HostQuery>) -> Self {
        Self::with_transport(config, OutboundTransport::new(host))
    }

    /// Creates a bridge with no host primitive.
    ///
    /// Every outbound send fails with `TransportError::Unavailable`; inbound
    /// dispatch works normally.  Useful when content runs outside a host.
    pub fn detached(config: BridgeConfig) -> Self {
        Self::with_transport(config, OutboundTransport::unavailable())
    }

    fn with_transport(config: BridgeConfig, transport: OutboundTransport) -> Self {
        let id = BridgeId::new();
        debug!(
            "bridge {id}: created (host available: {}, request timeout: {:?})",
            transport.is_available(),
            config.request_timeout
        );
        Self {
            inner: Arc::new(BridgeInner {
                id,
                config,
                registry: Mutex::new(ChannelRegistry::new()),
                correlator: Correlator::new(transport),
                lifecycle: Mutex::new(Lifecycle::default()),
                extensions: Mutex::new(HashMap::new()),
                runtime: Mutex::new(Handle::try_current().ok()),
            }),
        }
    }

    pub fn id(&self) -> BridgeId {
        self.inner.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Installation ──────────────────────────────────────────────────────────

    /// Installs the inbound receiver and returns the handle the host calls.
    ///
    /// The first install (and the first after each [`shutdown`](Self::shutdown))
    /// announces READY to the host, best effort, on a spawned task.  The
    /// receiver is returned without waiting for the host to answer READY.
    /// Later installs return a receiver for the same installation and send
    /// nothing.
    ///
    /// The runtime this is awaited on becomes the one host-issued requests
    /// are answered on.
    pub async fn install(&self) -> InboundReceiver {
        self.inner.capture_runtime();
        let (installation, first) = {
            let mut lifecycle = self.inner.lifecycle();
            if lifecycle.installed {
                (lifecycle.installation, false)
            } else {
                lifecycle.installed = true;
                lifecycle.installation += 1;
                (lifecycle.installation, true)
            }
        };

        let receiver = InboundReceiver::new(
            Arc::downgrade(&self.inner),
            installation,
            self.inner.config.receiver_name.clone(),
        );

        if first {
            info!(
                "bridge {}: receiver '{}' installed",
                self.inner.id,
                receiver.name()
            );
            self.announce_ready();
        }
        receiver
    }

    fn announce_ready(&self) {
        let id = self.inner.id;
        let Some(runtime) = self.inner.runtime() else {
            warn!("bridge {id}: no tokio runtime, READY not sent");
            return;
        };
        let transport = self.inner.correlator.transport().clone();
        runtime.spawn(async move {
            let delivery = transport.send_best_effort(&Envelope::ready()).await;
            debug!(
                "bridge {id}: READY {}",
                if delivery.is_delivered() { "delivered" } else { "suppressed" }
            );
        });
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lifecycle().installed
    }

    /// Tears the bridge down, as on a content reload.
    ///
    /// Clears every listener, handler and extension, and makes receivers from
    /// the current installation ignore further input.  Requests already in
    /// flight are not cancelled.
    pub fn shutdown(&self) {
        self.inner.lifecycle().installed = false;
        self.inner.registry().clear();
        // Drop extensions outside the lock; their destructors may call back in.
        let extensions: Vec<Extension> = self.inner.extensions().drain().map(|(_, e)| e).collect();
        drop(extensions);
        info!("bridge {}: shut down", self.inner.id);
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Sends a fire-and-forget EVENT.
    ///
    /// Transport failures are not errors; they come back as
    /// [`Delivery::Suppressed`].
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidChannel`] for an empty channel and
    /// [`BridgeError::Serialize`] if `payload` cannot be converted to JSON.
    pub async fn emit(&self, channel: &str, payload: impl Serialize) -> Result<Delivery, BridgeError> {
        validate_channel(channel)?;
        let payload = to_payload(payload)?;
        Ok(self
            .inner
            .correlator
            .transport()
            .send_best_effort(&Envelope::event(channel, payload))
            .await)
    }

    /// Sends a REQUEST and waits for the host's answer, bounded by the
    /// configured `request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Request`] when the host answers with a failure
    ///   (`handler_not_found`, a host handler error, `invalid_response`, ...).
    /// - [`BridgeError::Transport`] when the host call itself fails.
    /// - [`BridgeError::Timeout`] when no answer arrives in time.
    /// - [`BridgeError::InvalidChannel`] / [`BridgeError::Serialize`] for bad
    ///   input, without touching the transport.
    pub async fn request(&self, channel: &str, payload: impl Serialize) -> Result<Value, BridgeError> {
        self.request_with_timeout(channel, payload, self.inner.config.request_timeout)
            .await
    }

    /// Like [`request`](Self::request) with a per-call timeout; `None` waits
    /// forever.
    pub async fn request_with_timeout(
        &self,
        channel: &str,
        payload: impl Serialize,
        timeout: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        validate_channel(channel)?;
        let payload = to_payload(payload)?;
        self.inner.correlator.request(channel, payload, timeout).await
    }

    /// Sends a REQUEST and deserializes the answer into `T`.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request); an answer that does not fit `T` fails
    /// with an `invalid_response` [`BridgeError::Request`].
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        channel: &str,
        payload: impl Serialize,
    ) -> Result<T, BridgeError> {
        let value = self.request(channel, payload).await?;
        serde_json::from_value(value).map_err(|e| {
            BridgeError::Request(ErrorBody::new(
                error_codes::INVALID_RESPONSE,
                format!("Bridge returned an unexpected payload: {e}"),
            ))
        })
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Subscribes to EVENTs on `channel`.
    ///
    /// Listeners run in registration order on the thread that called the
    /// receiver.  An error or panic in one listener is logged and does not
    /// stop the rest.
    pub fn on<F>(&self, channel: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.inner.registry().add_listener(channel, Arc::new(listener));
        debug!("bridge {}: {id} subscribed to channel={channel}", self.inner.id);
        Subscription {
            bridge: Arc::downgrade(&self.inner),
            channel: channel.to_string(),
            id,
        }
    }

    /// Removes one listener.  Returns `false` if it was not registered.
    pub fn off(&self, channel: &str, id: ListenerId) -> bool {
        self.inner.registry().remove_listener(channel, id)
    }

    /// Registers the handler for host-issued requests on `channel`,
    /// replacing any previous one.
    ///
    /// Requests already dispatched keep running against the handler they
    /// were dispatched to.
    pub fn handle<H: RequestHandler>(&self, channel: &str, handler: H) -> HandlerRegistration {
        let (generation, replaced) = self.inner.registry().set_handler(channel, Arc::new(handler));
        if replaced {
            warn!("bridge {}: replaced request handler for channel={channel}", self.inner.id);
        } else {
            debug!("bridge {}: request handler registered for channel={channel}", self.inner.id);
        }
        HandlerRegistration {
            bridge: Arc::downgrade(&self.inner),
            channel: channel.to_string(),
            generation,
        }
    }

    /// [`handle`](Self::handle) for an async closure.
    pub fn handle_fn<F, Fut>(&self, channel: &str, f: F) -> HandlerRegistration
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(channel, handler_fn(f))
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner.registry().listener_count(channel)
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.inner.registry().has_handler(channel)
    }

    /// Channels with at least one listener or a handler, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.inner.registry().channels()
    }

    // ── Extensions ────────────────────────────────────────────────────────────

    /// Returns the extension of type `T` attached to this bridge, creating it
    /// with `init` on first use.
    ///
    /// Lets modules built on top of the bridge install themselves at most once
    /// per bridge.  `init` runs with the extension table locked and must not
    /// call back into the extension API.
    pub fn get_or_insert_extension<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce(&Bridge) -> Arc<T>,
    {
        let mut extensions = self.inner.extensions();
        if let Some(existing) = extensions.get(&TypeId::of::<T>()) {
            if let Ok(found) = Arc::clone(existing).downcast::<T>() {
                return found;
            }
        }
        let created = init(self);
        extensions.insert(TypeId::of::<T>(), Arc::clone(&created) as Extension);
        created
    }

    /// The extension of type `T`, if one is attached.
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let existing = Arc::clone(self.inner.extensions().get(&TypeId::of::<T>())?);
        existing.downcast::<T>().ok()
    }

    /// Detaches the extension of type `T`, if any.
    pub fn remove_extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let removed = self.inner.extensions().remove(&TypeId::of::<T>())?;
        removed.downcast::<T>().ok()
    }

    /// Detaches the extension of type `T` only if it is `instance`.
    ///
    /// Returns `false`, leaving the slot untouched, when the slot is empty or
    /// holds a different value (for example one attached after a shutdown).
    pub fn remove_extension_instance<T: Any + Send + Sync>(&self, instance: &T) -> bool {
        let removed = {
            let mut extensions = self.inner.extensions();
            let is_instance = extensions
                .get(&TypeId::of::<T>())
                .is_some_and(|current| is_same_instance(current, instance));
            if !is_instance {
                return false;
            }
            extensions.remove(&TypeId::of::<T>())
        };
        // Dropped outside the lock; the destructor may call back in.
        drop(removed);
        true
    }

    /// `true` if the extension slot for `T` holds `instance`.
    pub fn is_extension_instance<T: Any + Send + Sync>(&self, instance: &T) -> bool {
        self.inner
            .extensions()
            .get(&TypeId::of::<T>())
            .is_some_and(|current| is_same_instance(current, instance))
    }

    /// A weak handle that does not keep the bridge alive.
    pub fn downgrade(&self) -> WeakBridge {
        WeakBridge {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.inner.id)
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a [`Bridge`].
#[derive(Debug, Clone)]
pub struct WeakBridge {
    inner: Weak<BridgeInner>,
}

impl WeakBridge {
    pub fn upgrade(&self) -> Option<Bridge> {
        self.inner.upgrade().map(|inner| Bridge { inner })
    }
}

// ── Registration handles ──────────────────────────────────────────────────────

/// Returned by [`Bridge::on`].
///
/// Dropping a subscription leaves the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) or [`Bridge::off`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    bridge: Weak<BridgeInner>,
    channel: String,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Removes the listener.  Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.bridge
            .upgrade()
            .is_some_and(|inner| inner.registry().remove_listener(&self.channel, self.id))
    }
}

/// Returned by [`Bridge::handle`].
///
/// Like [`Subscription`], dropping it does not unregister anything.
#[derive(Debug)]
pub struct HandlerRegistration {
    bridge: Weak<BridgeInner>,
    channel: String,
    generation: u64,
}

impl HandlerRegistration {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Removes the handler if it is still the one this registration
    /// installed.  A handler that has since been replaced is left alone.
    pub fn unregister(self) -> bool {
        self.bridge
            .upgrade()
            .is_some_and(|inner| inner.registry().remove_handler(&self.channel, self.generation))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn is_same_instance<T>(current: &Extension, instance: &T) -> bool {
    std::ptr::eq(Arc::as_ptr(current).cast::<()>(), (instance as *const T).cast::<()>())
}

fn validate_channel(channel: &str) -> Result<(), BridgeError> {
    if channel.is_empty() {
        return Err(BridgeError::InvalidChannel);
    }
    Ok(())
}

fn to_payload(payload: impl Serialize) -> Result<Value, BridgeError> {
    serde_json::to_value(payload).map_err(BridgeError::Serialize)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
