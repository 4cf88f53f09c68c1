use crate::core::envelope::Envelope;
use crate::events::is_lifecycle_event;
use crate::traits::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Shared event handler
///
/// Handlers run synchronously on the task that dispatches the event.
/// A returned error or a panic is logged and does not affect the other
/// handlers registered for the same event.
pub type Handler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<String, Vec<Registration>>,
    next_id: u64,
}

/// In-process publish/subscribe registry keyed by event name
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event`
    ///
    /// Handlers for the same event run in registration order.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.on_handler(event, Arc::new(handler))
    }

    /// Register an already shared handler for `event`
    pub fn on_handler(&self, event: &str, handler: Handler) -> Subscription {
        let mut registry = self.registry.write();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, handler });

        Subscription {
            bus: self.clone(),
            event: event.to_string(),
            id,
        }
    }

    /// Remove every registration of `handler` for `event`
    ///
    /// Returns true if anything was removed.
    pub fn off(&self, event: &str, handler: &Handler) -> bool {
        let target = Arc::as_ptr(handler) as *const ();
        self.remove_where(event, |registration| {
            Arc::as_ptr(&registration.handler) as *const () == target
        })
    }

    fn remove(&self, event: &str, id: u64) -> bool {
        self.remove_where(event, |registration| registration.id == id)
    }

    fn remove_where(&self, event: &str, matches: impl Fn(&Registration) -> bool) -> bool {
        let mut registry = self.registry.write();
        let Some(registrations) = registry.handlers.get_mut(event) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| !matches(registration));
        let removed = registrations.len() != before;

        // Drop empty keys so transient subscriptions don't accumulate
        if registrations.is_empty() {
            registry.handlers.remove(event);
        }

        removed
    }

    /// Invoke every handler registered for `event`
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        // Snapshot so handlers can (un)subscribe without deadlocking
        let handlers: Vec<Handler> = match self.registry.read().handlers.get(event) {
            Some(registrations) => registrations
                .iter()
                .map(|registration| Arc::clone(&registration.handler))
                .collect(),
            None => return 0,
        };

        trace!("Dispatching '{}' to {} handlers", event, handlers.len());

        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Handler for '{}' failed: {}", event, e),
                Err(panic) => error!(
                    "Handler for '{}' panicked: {}",
                    event,
                    panic_message(panic.as_ref())
                ),
            }
        }

        handlers.len()
    }

    /// Decode an inbound text frame and dispatch it
    ///
    /// Malformed frames are logged and dropped. Frames naming a lifecycle
    /// event are dropped as well; only the connection manager emits those.
    /// Returns the number of handlers invoked.
    pub fn dispatch_frame(&self, text: &str) -> usize {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                debug!("Malformed frame contents: {}", text);
                return 0;
            }
        };

        if is_lifecycle_event(envelope.event()) {
            warn!(
                "Dropping inbound frame with reserved event name '{}'",
                envelope.event()
            );
            return 0;
        }

        let (event, data) = envelope.into_parts();
        self.emit(&event, &data)
    }

    /// Number of handlers registered for `event`
    pub fn handler_count(&self, event: &str) -> usize {
        self.registry
            .read()
            .handlers
            .get(event)
            .map_or(0, |registrations| registrations.len())
    }

    /// Number of event names with at least one handler
    pub fn event_count(&self) -> usize {
        self.registry.read().handlers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.event_count())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Capability to remove exactly one handler registration
///
/// Dropping a `Subscription` leaves the handler registered.
#[must_use = "call unsubscribe() to remove the handler"]
pub struct Subscription {
    bus: EventBus,
    event: String,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the registration. Returns false if it was already removed via `off`.
    pub fn unsubscribe(self) -> bool {
        self.bus.remove(&self.event, self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}
