//! Construction-time configuration shared by every concrete transport.
//!
//! Per-transport knobs (the stdio line-length cap, the SSE endpoint-discovery
//! timeout) live in their own crates; this is only the handful of settings
//! that apply regardless of which wire a transport rides.

use std::time::Duration;

/// Settings common to every [`crate::Transport`] implementation.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a `close()` call waits for in-flight sends to flush before
    /// giving up and tearing the connection down anyway.
    pub shutdown_grace: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_is_five_seconds() {
        assert_eq!(TransportConfig::default().shutdown_grace, Duration::from_secs(5));
    }
}
