use super::error::Result;
use async_trait::async_trait;

/// Close code sent on an intentional disconnect
pub const NORMAL_CLOSURE: u16 = 1000;

/// Type alias for WebSocket messages
/// Can be Text or Binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Write half of an open transport
#[async_trait]
pub trait TransportSink: Send + 'static {
    /// Write one whole-message frame
    async fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Close the transport with the given close code
    async fn close(&mut self, code: u16) -> Result<()>;
}

/// Read half of an open transport
#[async_trait]
pub trait TransportSource: Send + 'static {
    /// Receive the next data frame
    ///
    /// # Returns
    /// * `Some(Ok(message))` - A text or binary frame
    /// * `Some(Err(e))` - A transport error; the source may still yield a close afterwards
    /// * `None` - The transport is closed
    async fn recv(&mut self) -> Option<Result<WsMessage>>;
}

/// An opened transport, split into its two halves
pub struct Transport {
    pub sink: Box<dyn TransportSink>,
    pub source: Box<dyn TransportSource>,
}

impl Transport {
    pub fn new(sink: impl TransportSink, source: impl TransportSource) -> Self {
        Self {
            sink: Box::new(sink),
            source: Box::new(source),
        }
    }
}

/// Trait for opening transports to an endpoint
///
/// The connection manager calls this once per connection attempt.
/// Implementations must not retry internally; retry policy lives
/// in the manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Transport>;
}
