//! Consumer-facing lifecycle binding and typed restaurant feeds

pub mod adapter;
pub mod feeds;
pub mod models;

pub use adapter::{ActivationHandle, AdapterOptions, ConnectionView, RealtimeAdapter};
pub use feeds::{FeedHandle, OrderCallbacks};
pub use models::{KitchenNotification, NotificationKind, OrderEvent, OrderStatus, RestaurantScoped};
