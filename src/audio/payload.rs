use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::codec::decode_hex;
use crate::error::ChatError;

/// How the payload travelled on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    Hex,
}

/// Synthesized speech attached to a turn
///
/// The bytes are already decoded from the wire encoding; they are an audio
/// file (typically MP3) that still has to be decoded before playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    data: Arc<[u8]>,
    encoding: AudioEncoding,
}

impl AudioPayload {
    pub fn new(data: impl Into<Arc<[u8]>>, encoding: AudioEncoding) -> Self {
        Self {
            data: data.into(),
            encoding,
        }
    }

    /// Decode the `audio_bytes` field of a server event
    pub fn from_hex(encoded: &str) -> Result<Self, ChatError> {
        Ok(Self::new(decode_hex(encoded)?, AudioEncoding::Hex))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }
}
