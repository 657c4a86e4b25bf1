//! Chat orchestration
//!
//! `ChatSessionController` ties the connection, the wire codec and audio
//! playback together and exposes the conversation history to the UI.

mod controller;
mod turn;

pub use controller::{ChatEvent, ChatSessionController};
pub use turn::{ChatStats, ChatTurn, Origin};
