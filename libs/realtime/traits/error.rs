use thiserror::Error;

/// Main error type for the realtime layer
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket transport error (handshake, read or write failure)
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Envelope could not be encoded or decoded
    #[error("Envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    /// An event handler reported a failure
    #[error("Handler error: {0}")]
    Handler(String),

    /// Reconnection budget used up
    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectionFailed { attempts: u32 },
}

impl RealtimeError {
    /// Shorthand for handlers that want to fail with a message
    pub fn handler(message: impl Into<String>) -> Self {
        RealtimeError::Handler(message.into())
    }
}

/// Result type for realtime operations
pub type Result<T> = std::result::Result<T, RealtimeError>;
