use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics about a connection session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Number of connect attempts (initial + reconnects)
    pub connect_attempts: usize,

    /// Number of successful handshakes
    pub connections_opened: usize,

    /// Number of reconnect timers scheduled after a failure or abnormal closure
    pub reconnects_scheduled: usize,

    /// Frames delivered to the message handler
    pub frames_received: usize,

    /// Frames written to the transport
    pub frames_sent: usize,
}

/// Live counters owned by the session driver
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub connect_attempts: AtomicUsize,
    pub connections_opened: AtomicUsize,
    pub reconnects_scheduled: AtomicUsize,
    pub frames_received: AtomicUsize,
    pub frames_sent: AtomicUsize,
}

impl SessionCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, started_at: DateTime<Utc>) -> SessionStats {
        SessionStats {
            started_at,
            connect_attempts: self.connect_attempts.load(Ordering::SeqCst),
            connections_opened: self.connections_opened.load(Ordering::SeqCst),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::SeqCst),
            frames_received: self.frames_received.load(Ordering::SeqCst),
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
        }
    }
}
