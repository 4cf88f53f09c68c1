//! # Realtime Traits
//!
//! Core traits and types shared across the realtime layer:
//!
//! - **Connector / TransportSink / TransportSource**: Open and drive one socket
//! - **ReconnectionStrategy**: Control reconnection spacing and budget
//! - **RealtimeError**: Error type for every fallible operation
//!
//! ## Example
//!
//! ```rust,ignore
//! use realtime::traits::*;
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn open(&self, url: &str) -> Result<Transport> {
//!         // Dial the endpoint and split it into sink/source halves
//!     }
//! }
//! ```

pub mod error;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{RealtimeError, Result};
pub use reconnect::{LinearBackoff, ReconnectionStrategy};
pub use transport::{
    Connector, Transport, TransportSink, TransportSource, WsMessage, NORMAL_CLOSURE,
};
