use thiserror::Error;

/// Errors surfaced by the chat session core.
///
/// Only `NotConnected` (and `EmptyMessage`) reach the caller of a user-initiated
/// send. Inbound decode failures and playback failures are contained where they
/// are detected and logged; they never tear the session down.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A send was attempted while the connection was not open
    #[error("Not connected to the translation service")]
    NotConnected,

    /// The message text was empty after trimming
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Invalid language code: {0:?}")]
    InvalidLanguage(String),

    /// An inbound frame could not be parsed as a server event
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The hex-encoded audio field is not valid hex
    #[error("Invalid audio encoding: {0}")]
    InvalidAudioEncoding(String),

    /// Connect, read or write failure on the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Audio bytes decoded from the wire could not be decoded as audio
    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    #[error("Audio output unavailable: {0}")]
    AudioOutput(String),

    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// The collaborator HTTP service answered with an error
    #[error("Service error: {0}")]
    Service(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
