//! # Connection core
//!
//! Transport lifecycle for the realtime layer: configuration, the
//! connection state machine, the wire envelope and the tokio-tungstenite
//! transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use realtime::core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bus = EventBus::new();
//!     let manager = ConnectionManager::new(
//!         RealtimeConfig::new("wss://api.example.com/ws")
//!             .with_max_reconnect_attempts(5)
//!             .with_reconnect_base_delay(Duration::from_secs(3)),
//!         bus.clone(),
//!     );
//!
//!     manager.connect().await?;
//!     manager.send("ping", &json!({}));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection_state;
pub mod envelope;
pub mod logging;
pub mod manager;
pub mod tungstenite;

// Re-export main types
pub use config::{ConfigError, RealtimeConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use envelope::Envelope;
pub use logging::init_tracing;
pub use manager::ConnectionManager;
pub use tungstenite::TungsteniteConnector;

// Re-export traits for convenience
pub use crate::traits::*;
