use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::AudioPayload;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Typed by the user (optimistic echo)
    Local,
    /// Received from the translation service
    Remote,
}

/// One message in the conversation
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub id: Uuid,
    pub original_text: String,
    /// Empty for local echoes
    pub translated_text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub audio: Option<AudioPayload>,
}

impl ChatTurn {
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: text.into(),
            translated_text: String::new(),
            origin: Origin::Local,
            created_at: Utc::now(),
            audio: None,
        }
    }

    pub fn remote(
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        audio: Option<AudioPayload>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            origin: Origin::Remote,
            created_at: Utc::now(),
            audio,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }
}

/// Statistics about a chat session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStats {
    /// Turns in the history
    pub turns: usize,

    /// Local echoes appended
    pub local_turns: usize,

    /// Remote turns appended
    pub remote_turns: usize,

    /// Inbound frames dropped because they failed to decode
    pub dropped_events: usize,

    /// Remote turns that carried audio
    pub audio_clips: usize,
}
