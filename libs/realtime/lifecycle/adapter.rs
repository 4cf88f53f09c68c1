use crate::bus::Subscription;
use crate::channels::ChannelTracker;
use crate::core::ConnectionManager;
use crate::events;
use crate::traits::RealtimeError;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// How an activation treats the shared connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Connect on activation unless already connected or connecting
    pub auto_connect: bool,
    /// Leave the connection open when the activation ends
    pub persist_connection: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            persist_connection: true,
        }
    }
}

/// What a consumer sees of the connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionView {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub error: Option<String>,
}

type SharedView = Arc<RwLock<ConnectionView>>;

/// Consumer-facing entry point to the realtime layer
///
/// All adapters built on clones of the same [`ChannelTracker`] share one
/// connection. [`activate`](Self::activate) ties a consumer's lifetime to the
/// connection's events; the typed feeds in `feeds.rs` scope domain events to
/// one restaurant.
#[derive(Debug, Clone)]
pub struct RealtimeAdapter {
    pub(crate) tracker: ChannelTracker,
    options: AdapterOptions,
}

impl RealtimeAdapter {
    pub fn new(tracker: ChannelTracker, options: AdapterOptions) -> Self {
        Self { tracker, options }
    }

    /// Start mirroring connection events into a [`ConnectionView`]
    ///
    /// Must be called inside a tokio runtime when `auto_connect` is set.
    pub fn activate(&self) -> ActivationHandle {
        let manager = self.manager().clone();
        let view: SharedView = Arc::new(RwLock::new(ConnectionView {
            is_connected: manager.is_connected(),
            is_connecting: manager.is_connecting(),
            error: None,
        }));

        let bus = manager.bus();
        let on_disconnect = manager.clone();
        let on_error = manager.clone();
        let subscriptions = vec![
            bus.on(events::CONNECTED, mirror(&view, |view, _| {
                view.is_connected = true;
                view.is_connecting = false;
                view.error = None;
            })),
            // A backoff timer armed by the manager counts as connecting
            bus.on(events::DISCONNECTED, mirror(&view, move |view, _| {
                view.is_connected = false;
                view.is_connecting = on_disconnect.is_reconnecting();
            })),
            bus.on(events::ERROR, mirror(&view, move |view, data| {
                view.is_connecting = on_error.is_reconnecting();
                view.error = Some(error_message(data));
            })),
            bus.on(events::RECONNECT_FAILED, mirror(&view, |view, data| {
                let attempts = data
                    .get("attempts")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or_default();
                view.is_connected = false;
                view.is_connecting = false;
                view.error = Some(RealtimeError::ReconnectionFailed { attempts }.to_string());
            })),
        ];

        if self.options.auto_connect && !manager.is_connected() && !manager.is_connecting() {
            view.write().is_connecting = true;

            let connecting = manager.clone();
            let connect_view = Arc::clone(&view);
            tokio::spawn(async move {
                if let Err(e) = connecting.connect().await {
                    warn!("Auto-connect failed: {}", e);
                    let mut view = connect_view.write();
                    view.is_connecting = false;
                    view.error = Some(e.to_string());
                }
            });
        }

        ActivationHandle {
            manager,
            view,
            subscriptions,
            persist_connection: self.options.persist_connection,
        }
    }

    /// Send an event over the shared connection; `false` when not connected
    pub fn send<T>(&self, event: &str, payload: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        self.manager().send(event, payload)
    }

    pub fn manager(&self) -> &ConnectionManager {
        self.tracker.manager()
    }

    pub fn tracker(&self) -> &ChannelTracker {
        &self.tracker
    }

    pub fn options(&self) -> AdapterOptions {
        self.options
    }
}

/// Wrap a view update as a bus handler
fn mirror<F>(view: &SharedView, update: F) -> impl Fn(&Value) -> crate::Result<()> + Send + Sync + 'static
where
    F: Fn(&mut ConnectionView, &Value) + Send + Sync + 'static,
{
    let view = Arc::clone(view);
    move |data: &Value| {
        update(&mut view.write(), data);
        Ok(())
    }
}

fn error_message(data: &Value) -> String {
    match data.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => data.to_string(),
    }
}

/// A live activation; deactivates when dropped
#[must_use = "dropping the handle deactivates it"]
pub struct ActivationHandle {
    manager: ConnectionManager,
    view: SharedView,
    subscriptions: Vec<Subscription>,
    persist_connection: bool,
}

impl ActivationHandle {
    /// Snapshot of the connection as seen by this activation
    pub fn view(&self) -> ConnectionView {
        self.view.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.view.read().is_connected
    }

    pub fn is_connecting(&self) -> bool {
        self.view.read().is_connecting
    }

    pub fn error(&self) -> Option<String> {
        self.view.read().error.clone()
    }

    /// End the activation
    ///
    /// Removes every handler it registered and, unless the connection is
    /// persistent, disconnects the shared manager.
    pub fn deactivate(self) {}
}

impl Drop for ActivationHandle {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if !self.persist_connection {
            debug!("Activation ended, closing non-persistent connection");
            self.manager.disconnect();
        }
    }
}

impl std::fmt::Debug for ActivationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationHandle")
            .field("view", &self.view())
            .field("persist_connection", &self.persist_connection)
            .finish()
    }
}
