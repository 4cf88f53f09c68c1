use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how the connection manager
/// spaces out reconnection attempts after an abnormal closure.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the given reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt about to be scheduled (1-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Retry budget exhausted, stop reconnecting
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Maximum number of attempts this strategy allows
    fn max_attempts(&self) -> u32;
}

/// Linear backoff reconnection strategy
///
/// The Nth attempt waits `base_delay * N`. Attempts beyond
/// `max_attempts` are refused.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base_delay: Duration,
    max_attempts: u32,
}

impl LinearBackoff {
    /// Create a new linear backoff strategy
    ///
    /// # Arguments
    /// * `base_delay` - Backoff unit multiplied by the attempt number
    /// * `max_attempts` - Maximum number of reconnection attempts
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

impl ReconnectionStrategy for LinearBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        self.base_delay.checked_mul(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
