//! Connection session management
//!
//! This module provides the `ConnectionSession` abstraction that manages:
//! - The persistent connection to the translation service
//! - The connection state machine (connect, open, reconnect, close)
//! - Fixed-delay reconnection after abnormal closures
//! - Single-slot message and state subscriptions
//! - Session statistics

mod config;
mod session;
mod state;
mod stats;
pub mod transport;

pub use config::SessionConfig;
pub use session::{ConnectionSession, MessageHandler, StateHandler};
pub use state::{ConnectionState, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
pub use stats::SessionStats;
pub use transport::{Connector, Transport, TransportEvent, WebSocketConnector};
