//! Connection lifecycle primitives.

use std::time::Duration;

/// States of one adapter connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for an inbound connection (listen mode) or dialing
    /// (connect mode).
    Listening,
    /// Socket is up; no frame processed yet.
    Connected,
    /// At least one frame processed; heartbeat checks apply.
    Established,
    /// Link is down; availability fallback has run.
    Closed,
}

/// Exponential backoff for connect-mode reconnection.
///
/// The configured retry interval is the base; the delay doubles per
/// consecutive failure and is capped, resetting after a successful
/// connection.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: Duration::from_secs(60),
        }
    }

    /// Delay before reconnection attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(6));
        self.base.saturating_mul(multiplier).min(self.max)
    }
}
