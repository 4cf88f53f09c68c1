use super::adapter::RealtimeAdapter;
use super::models::{KitchenNotification, OrderEvent, RestaurantScoped};
use crate::bus::Subscription;
use crate::channels::{Channel, ChannelSubscription};
use crate::events;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Callbacks for the order feed of one restaurant
///
/// Unset callbacks register nothing.
#[derive(Default)]
pub struct OrderCallbacks {
    on_created: Option<Callback<OrderEvent>>,
    on_updated: Option<Callback<OrderEvent>>,
    on_status_changed: Option<Callback<OrderEvent>>,
}

impl OrderCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_created(mut self, callback: impl Fn(OrderEvent) + Send + Sync + 'static) -> Self {
        self.on_created = Some(Arc::new(callback));
        self
    }

    pub fn on_updated(mut self, callback: impl Fn(OrderEvent) + Send + Sync + 'static) -> Self {
        self.on_updated = Some(Arc::new(callback));
        self
    }

    pub fn on_status_changed(
        mut self,
        callback: impl Fn(OrderEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_changed = Some(Arc::new(callback));
        self
    }
}

impl RealtimeAdapter {
    /// Follow `orders:<restaurant_id>` until the handle is dropped
    pub fn watch_orders(&self, restaurant_id: &str, callbacks: OrderCallbacks) -> FeedHandle {
        let channel = self.tracker.subscribe(Channel::orders(restaurant_id));
        let bus = self.manager().bus();

        let subscriptions = [
            (events::ORDER_CREATED, callbacks.on_created),
            (events::ORDER_UPDATED, callbacks.on_updated),
            (events::ORDER_STATUS_CHANGED, callbacks.on_status_changed),
        ]
        .into_iter()
        .filter_map(|(event, callback)| {
            callback.map(|callback| bus.on(event, scoped(event, restaurant_id, callback)))
        })
        .collect();

        FeedHandle {
            subscriptions,
            channel: Some(channel),
        }
    }

    /// Follow `kitchen:<restaurant_id>` until the handle is dropped
    pub fn watch_kitchen<F>(&self, restaurant_id: &str, on_notification: F) -> FeedHandle
    where
        F: Fn(KitchenNotification) + Send + Sync + 'static,
    {
        let channel = self.tracker.subscribe(Channel::kitchen(restaurant_id));
        let callback: Callback<KitchenNotification> = Arc::new(on_notification);
        let subscription = self.manager().bus().on(
            events::KITCHEN_NOTIFICATION,
            scoped(events::KITCHEN_NOTIFICATION, restaurant_id, callback),
        );

        FeedHandle {
            subscriptions: vec![subscription],
            channel: Some(channel),
        }
    }
}

/// Decode `data` into `T` and hand it on when it belongs to `restaurant_id`
fn scoped<T>(
    event: &'static str,
    restaurant_id: &str,
    callback: Callback<T>,
) -> impl Fn(&Value) -> crate::Result<()> + Send + Sync + 'static
where
    T: DeserializeOwned + RestaurantScoped + 'static,
{
    let restaurant_id = restaurant_id.to_string();
    move |data: &Value| {
        let payload = match T::deserialize(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping '{}' with unexpected payload: {}", event, e);
                return Ok(());
            }
        };

        if !payload.belongs_to(&restaurant_id) {
            trace!("Skipping '{}' for another restaurant", event);
            return Ok(());
        }

        callback(payload);
        Ok(())
    }
}

/// A live feed; closes when dropped
#[must_use = "dropping the handle closes the feed"]
#[derive(Debug)]
pub struct FeedHandle {
    subscriptions: Vec<Subscription>,
    channel: Option<ChannelSubscription>,
}

impl FeedHandle {
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref().map(ChannelSubscription::channel)
    }

    /// Stop the feed and release its channel
    pub fn close(self) {}
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(channel) = self.channel.take() {
            channel.unsubscribe();
        }
    }
}
