//! Event bus
//!
//! Decouples senders of events from their consumers. The connection
//! manager publishes lifecycle events here and hands every inbound text
//! frame to [`EventBus::dispatch_frame`]; consumers register handlers by
//! event name.
//!
//! ```text
//! Transport → frame → Envelope::decode → EventBus → handler, handler, ...
//!                          ↓ (malformed)
//!                       logged, dropped
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{EventBus, Handler, Subscription};
