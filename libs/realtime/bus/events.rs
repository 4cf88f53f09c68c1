//! Event names understood by the realtime layer

/// Transport opened
pub const CONNECTED: &str = "connected";
/// Opened transport closed (clean or abnormal)
pub const DISCONNECTED: &str = "disconnected";
/// Transport or connect failure; payload `{ "message": string }`
pub const ERROR: &str = "error";
/// Retry budget used up; payload `{ "attempts": number }`
pub const RECONNECT_FAILED: &str = "reconnect_failed";

/// Control message asking the server to stream a channel
pub const SUBSCRIBE: &str = "subscribe";
/// Control message asking the server to stop streaming a channel
pub const UNSUBSCRIBE: &str = "unsubscribe";

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_UPDATED: &str = "order.updated";
pub const ORDER_STATUS_CHANGED: &str = "order.status.changed";
pub const KITCHEN_NOTIFICATION: &str = "kitchen.notification";

/// Lifecycle events only the connection manager may emit
pub const LIFECYCLE_EVENTS: [&str; 4] = [CONNECTED, DISCONNECTED, ERROR, RECONNECT_FAILED];

#[inline]
pub fn is_lifecycle_event(event: &str) -> bool {
    LIFECYCLE_EVENTS.contains(&event)
}
