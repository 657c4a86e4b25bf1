use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::turn::{ChatStats, ChatTurn};
use crate::audio::{AudioPayload, AudioPlaybackEngine, PlaybackOutcome};
use crate::codec::{self, LanguageCode, OutgoingRequest};
use crate::connection::{ConnectionSession, ConnectionState, NORMAL_CLOSURE};
use crate::error::ChatError;

/// Notifications for the UI layer, in the order history changed
#[derive(Debug, Clone)]
pub enum ChatEvent {
    TurnAppended(ChatTurn),
    ConnectivityChanged(bool),
}

#[derive(Default)]
struct Conversation {
    turns: Vec<ChatTurn>,
    stats: ChatStats,
}

/// Controller state reachable from the session handlers
struct Inner {
    conversation: Mutex<Conversation>,
    events: mpsc::UnboundedSender<ChatEvent>,
    audio: Option<Arc<AudioPlaybackEngine>>,
    connected: AtomicBool,
}

impl Inner {
    /// Append-only; the event is emitted under the lock so UI order matches history order
    fn append(&self, turn: ChatTurn) {
        let mut conversation = self.conversation.lock();

        if turn.is_local() {
            conversation.stats.local_turns += 1;
        } else {
            conversation.stats.remote_turns += 1;
        }
        if turn.audio.is_some() {
            conversation.stats.audio_clips += 1;
        }

        conversation.turns.push(turn.clone());
        conversation.stats.turns = conversation.turns.len();

        // Receiver gone just means nobody is rendering
        let _ = self.events.send(ChatEvent::TurnAppended(turn));
    }

    fn drop_event(&self, error: &ChatError) {
        warn!("Dropping inbound event: {}", error);
        self.conversation.lock().stats.dropped_events += 1;
    }

    fn handle_frame(&self, frame: &str) {
        let event = match codec::decode_event(frame) {
            Ok(event) => event,
            Err(e) => return self.drop_event(&e),
        };

        let audio = match event.audio_bytes.as_deref() {
            None | Some("") => None,
            Some(hex) => match AudioPayload::from_hex(hex) {
                Ok(payload) => Some(payload),
                Err(e) => return self.drop_event(&e),
            },
        };

        debug!(
            "Received translation ({} chars, audio: {} bytes)",
            event.translated_text.len(),
            audio.as_ref().map_or(0, AudioPayload::len)
        );

        let turn = ChatTurn::remote(event.original_text, event.translated_text, audio);
        let playback = turn.audio.clone();
        self.append(turn);

        if let (Some(engine), Some(payload)) = (self.audio.as_ref(), playback.as_ref()) {
            // Not awaited: delivery never waits on audio
            drop(engine.play(payload));
        }
    }

    fn connectivity_changed(&self, state: &ConnectionState) {
        let connected = state.is_open();
        if self.connected.swap(connected, Ordering::SeqCst) != connected {
            let _ = self.events.send(ChatEvent::ConnectivityChanged(connected));
        }
    }
}

/// Orchestrates a chat: local echo, remote turns and speech playback
///
/// Owns the connection session it is given. Local echoes and remote turns
/// are kept as separate turns; nothing is merged.
pub struct ChatSessionController {
    session: ConnectionSession,
    inner: Arc<Inner>,
}

impl ChatSessionController {
    /// Wire the controller to `session` and return the UI event stream
    ///
    /// Replaces any handlers already registered on the session. Pass `None`
    /// for `audio` to skip playback.
    pub fn new(
        session: ConnectionSession,
        audio: Option<Arc<AudioPlaybackEngine>>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            conversation: Mutex::new(Conversation::default()),
            events,
            audio,
            connected: AtomicBool::new(session.is_connected()),
        });

        let on_frame = Arc::clone(&inner);
        session.on_message(move |frame| on_frame.handle_frame(&frame));

        let on_state = Arc::clone(&inner);
        session.on_state_change(move |state| on_state.connectivity_changed(state));

        (Self { session, inner }, events_rx)
    }

    /// Start the session
    pub fn open(&self, url: &str) {
        self.session.open(url);
    }

    /// Send a message, echoing it into the history first
    ///
    /// Rejects blank text and a closed connection without touching history.
    /// If the transport fails after the echo, the echo stays and the error is
    /// returned; nothing is retried.
    pub async fn send_text(&self, text: &str, language: &LanguageCode) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if !self.session.is_connected() {
            return Err(ChatError::NotConnected);
        }

        self.inner.append(ChatTurn::local(text));

        let request = OutgoingRequest::new(text, language.clone());
        if let Err(e) = self.session.send(&request).await {
            warn!("Send failed, local echo kept: {}", e);
            return Err(e);
        }

        Ok(())
    }

    /// Snapshot of the conversation, oldest first
    pub fn history(&self) -> Vec<ChatTurn> {
        self.inner.conversation.lock().turns.clone()
    }

    /// Play a turn's speech again
    ///
    /// `None` if the turn is unknown, carries no audio, or playback is off.
    pub fn replay(&self, id: Uuid) -> Option<JoinHandle<PlaybackOutcome>> {
        let engine = self.inner.audio.as_ref()?;

        let payload = {
            let conversation = self.inner.conversation.lock();
            let audio = conversation
                .turns
                .iter()
                .find(|turn| turn.id == id)
                .and_then(|turn| turn.audio.clone());
            audio
        }?;

        debug!("Replaying audio for turn {}", id);
        Some(engine.play(&payload))
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn stats(&self) -> ChatStats {
        self.inner.conversation.lock().stats.clone()
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// Close the session normally and release the audio output
    pub async fn shutdown(&self) {
        info!("Shutting down chat session");
        self.session
            .close(NORMAL_CLOSURE, "client shutdown")
            .await;

        if let Some(audio) = &self.inner.audio {
            audio.dispose();
        }
    }
}

impl Drop for ChatSessionController {
    fn drop(&mut self) {
        // The session shuts itself down when its handle drops
        if let Some(audio) = &self.inner.audio {
            audio.dispose();
        }
    }
}
