use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a connection session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay between an abnormal closure and the next connect attempt
    /// Default: 2 seconds
    pub reconnect_delay: Duration,

    /// Upper bound for a single connect/handshake attempt (None = unbounded)
    pub connect_timeout: Option<Duration>,

    /// How long a client-initiated close waits for the close handshake
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(2000),
            connect_timeout: Some(Duration::from_secs(10)),
            close_timeout: Duration::from_secs(2),
        }
    }
}
