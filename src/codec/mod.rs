//! Wire codec for the translation chat protocol
//!
//! Frames are JSON text:
//! - client → server: `{"text": ..., "target_language": ...}`
//! - server → client: `{"original_text": ..., "translated_text": ..., "audio_bytes": <hex>?}`
//!
//! Audio arrives hex-encoded inside the event. Hex decoding lives here, apart
//! from audio-format decoding, so wire faults and audio faults stay distinct.

pub mod hex;
pub mod messages;

pub use hex::{decode_hex, encode_hex};
pub use messages::{IncomingEvent, LanguageCode, OutgoingRequest};

use crate::error::ChatError;

/// Serialize a chat request into a wire frame
pub fn encode_request(request: &OutgoingRequest) -> Result<String, ChatError> {
    serde_json::to_string(request).map_err(|e| ChatError::MalformedEvent(e.to_string()))
}

/// Parse a chat request frame (server side of the protocol)
pub fn decode_request(frame: &str) -> Result<OutgoingRequest, ChatError> {
    serde_json::from_str(frame).map_err(|e| ChatError::MalformedEvent(e.to_string()))
}

/// Parse a server event frame
pub fn decode_event(frame: &str) -> Result<IncomingEvent, ChatError> {
    serde_json::from_str(frame).map_err(|e| ChatError::MalformedEvent(e.to_string()))
}

/// Serialize a server event into a wire frame
pub fn encode_event(event: &IncomingEvent) -> Result<String, ChatError> {
    serde_json::to_string(event).map_err(|e| ChatError::MalformedEvent(e.to_string()))
}
