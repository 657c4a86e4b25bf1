use serde::{Deserialize, Serialize};
use std::fmt;

/// Close code for an intentional, normal shutdown. Suppresses reconnection.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket drops without a close handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Lifecycle state of a connection session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Constructed, `open` not called yet
    Idle,
    Connecting,
    Open,
    Closing,
    /// Terminal
    Closed { code: u16, reason: String },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closing => f.write_str("closing"),
            Self::Closed { code, reason } => write!(f, "closed ({code}: {reason})"),
        }
    }
}
