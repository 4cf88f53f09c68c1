//! # Realtime
//!
//! Real-time connection layer for the order desk: one WebSocket per
//! process, an event bus in front of it, channel intent that survives
//! reconnects and typed order/kitchen feeds for consumers.
//!
//! ## Features
//!
//! - **Single connection**: Concurrent connect calls share one transport open
//! - **Linear backoff**: Bounded automatic reconnection after abnormal closures
//! - **Event bus**: Handlers isolated from each other's failures and panics
//! - **Channel tracking**: Desired channels re-asserted on every reconnect
//! - **Activation handles**: Consumer lifetimes tied to RAII guards
//!
//! ## Example
//!
//! ```rust,ignore
//! use realtime::*;
//!
//! let bus = EventBus::new();
//! let manager = ConnectionManager::new(RealtimeConfig::from_env()?, bus);
//! let adapter = RealtimeAdapter::new(ChannelTracker::new(manager), AdapterOptions::default());
//!
//! let activation = adapter.activate();
//! let _orders = adapter.watch_orders(
//!     "r1",
//!     OrderCallbacks::new().on_created(|order| println!("new order {}", order.order_id)),
//! );
//! ```

pub mod bus;
pub mod channels;
pub mod core;
pub mod lifecycle;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export the connection core
pub use self::core::{
    config, connection_state, envelope, logging, manager,
    config::{ConfigError, RealtimeConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    envelope::Envelope,
    logging::init_tracing,
    manager::ConnectionManager,
    tungstenite::TungsteniteConnector,
};

pub use bus::{events, EventBus, Handler, Subscription};
pub use channels::{Channel, ChannelSubscription, ChannelTracker};
pub use lifecycle::{
    ActivationHandle, AdapterOptions, ConnectionView, FeedHandle, KitchenNotification,
    NotificationKind, OrderCallbacks, OrderEvent, OrderStatus, RealtimeAdapter, RestaurantScoped,
};
