use crate::bus::Subscription;
use crate::core::ConnectionManager;
use crate::events;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A logical, server-recognized stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Order stream for one restaurant: `orders:<restaurant_id>`
    pub fn orders(restaurant_id: &str) -> Self {
        Self(format!("orders:{}", restaurant_id))
    }

    /// Kitchen stream for one restaurant: `kitchen:<restaurant_id>`
    pub fn kitchen(restaurant_id: &str) -> Self {
        Self(format!("kitchen:{}", restaurant_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `data` of `subscribe` / `unsubscribe` control messages
#[derive(Serialize)]
struct ChannelRequest<'a> {
    channel: &'a str,
}

/// Desired channels with the number of live subscriptions to each
type DesiredSet = Arc<Mutex<HashMap<Channel, usize>>>;

struct TrackerInner {
    manager: ConnectionManager,
    desired: DesiredSet,
    resubscribe: Mutex<Option<Subscription>>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(subscription) = self.resubscribe.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

/// Keeps the client's channel intent alive across reconnects
///
/// The server forgets subscriptions when the socket drops, so every
/// desired channel is re-sent on each `connected` event. Channels are
/// reference counted: the control message goes out when the first
/// consumer subscribes and when the last one leaves.
#[derive(Clone)]
pub struct ChannelTracker {
    inner: Arc<TrackerInner>,
}

impl ChannelTracker {
    pub fn new(manager: ConnectionManager) -> Self {
        let desired: DesiredSet = Arc::new(Mutex::new(HashMap::new()));

        let handler_manager = manager.clone();
        let handler_desired = Arc::clone(&desired);
        let resubscribe = manager.bus().on(events::CONNECTED, move |_| {
            let channels: Vec<Channel> = handler_desired.lock().keys().cloned().collect();
            if !channels.is_empty() {
                info!("Re-asserting {} channel subscriptions", channels.len());
            }
            for channel in &channels {
                send_control(&handler_manager, events::SUBSCRIBE, channel);
            }
            Ok(())
        });

        Self {
            inner: Arc::new(TrackerInner {
                manager,
                desired,
                resubscribe: Mutex::new(Some(resubscribe)),
            }),
        }
    }

    /// Record interest in `channel`, telling the server right away if connected
    pub fn subscribe(&self, channel: Channel) -> ChannelSubscription {
        let first = {
            let mut desired = self.inner.desired.lock();
            let count = desired.entry(channel.clone()).or_insert(0);
            *count += 1;
            *count == 1
        };

        if first && !send_control(&self.inner.manager, events::SUBSCRIBE, &channel) {
            debug!("Recorded {} for the next connection", channel);
        }

        ChannelSubscription {
            tracker: self.clone(),
            channel,
        }
    }

    fn release(&self, channel: &Channel) {
        let last = {
            let mut desired = self.inner.desired.lock();
            match desired.get_mut(channel) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    desired.remove(channel);
                    true
                }
                None => false,
            }
        };

        if last {
            send_control(&self.inner.manager, events::UNSUBSCRIBE, channel);
        }
    }

    /// Channels re-asserted on the next connection, sorted
    pub fn desired_channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.inner.desired.lock().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn is_desired(&self, channel: &Channel) -> bool {
        self.inner.desired.lock().contains_key(channel)
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }
}

fn send_control(manager: &ConnectionManager, event: &str, channel: &Channel) -> bool {
    let sent = manager.send(
        event,
        &ChannelRequest {
            channel: channel.as_str(),
        },
    );
    if sent {
        debug!("Sent {} for {}", event, channel);
    }
    sent
}

/// One consumer's interest in a channel
#[must_use = "call unsubscribe() to release the channel"]
#[derive(Debug)]
pub struct ChannelSubscription {
    tracker: ChannelTracker,
    channel: Channel,
}

impl ChannelSubscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Release the channel
    ///
    /// Removed from the desired set even while disconnected, so the next
    /// reconnect does not re-assert it; the server is told if connected.
    pub fn unsubscribe(self) {
        self.tracker.release(&self.channel);
    }
}

impl fmt::Debug for ChannelTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTracker")
            .field("desired", &self.desired_channels())
            .finish()
    }
}
