pub mod audio;
pub mod chat;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;

pub use audio::{AudioPayload, AudioPlaybackEngine, MicrophoneRecorder, PlaybackOutcome};
pub use chat::{ChatEvent, ChatSessionController, ChatTurn, Origin};
pub use codec::{IncomingEvent, LanguageCode, OutgoingRequest};
pub use config::Config;
pub use connection::{ConnectionSession, ConnectionState, SessionConfig, WebSocketConnector};
pub use error::ChatError;
pub use http::{Language, ServiceClient};
