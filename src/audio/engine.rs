use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use super::decode::decode_audio;
use super::output::{OutputContext, OutputFactory, RodioOutputFactory};
use super::payload::AudioPayload;
use crate::error::ChatError;

/// Result of one `play` call. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// Clip queued on the output
    Played { frames: usize, sample_rate: u32 },
    /// Bytes were not decodable audio
    Unsupported(String),
    /// No output device could be opened, or it rejected the clip
    OutputUnavailable(String),
    /// The engine was disposed before playback started
    Disposed,
}

/// Decodes speech payloads and plays them on a single, lazily created output
///
/// Playback is fire-and-forget: `play` spawns and returns immediately, so
/// message handling never waits on audio.
pub struct AudioPlaybackEngine {
    factory: Arc<dyn OutputFactory>,
    /// At most one context for the engine's lifetime
    context: Mutex<Option<Arc<dyn OutputContext>>>,
    disposed: AtomicBool,
    in_flight: Mutex<Vec<AbortHandle>>,
}

impl AudioPlaybackEngine {
    pub fn new(factory: Arc<dyn OutputFactory>) -> Self {
        Self {
            factory,
            context: Mutex::new(None),
            disposed: AtomicBool::new(false),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Engine playing through the default system output
    pub fn with_default_output(volume: f32) -> Self {
        Self::new(Arc::new(RodioOutputFactory::new(volume)))
    }

    /// Decode and play `payload` in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn play(self: &Arc<Self>, payload: &AudioPayload) -> JoinHandle<PlaybackOutcome> {
        let engine = Arc::clone(self);
        let data = payload.shared_bytes();

        let handle = tokio::spawn(async move {
            if engine.is_disposed() {
                return PlaybackOutcome::Disposed;
            }

            let clip = match tokio::task::spawn_blocking(move || decode_audio(data)).await {
                Ok(Ok(clip)) => clip,
                Ok(Err(e)) => {
                    warn!("Skipping playback: {}", e);
                    return PlaybackOutcome::Unsupported(e.to_string());
                }
                Err(e) => {
                    warn!("Audio decode task failed: {}", e);
                    return PlaybackOutcome::Unsupported(e.to_string());
                }
            };

            let frames = clip.frames();
            let sample_rate = clip.sample_rate;

            // Opening a device and queueing on it are blocking calls
            let queued = tokio::task::spawn_blocking(move || match engine.acquire_context()? {
                Some(context) => context.play(clip).map(|_| true),
                None => Ok(false),
            })
            .await;

            match queued {
                Ok(Ok(true)) => PlaybackOutcome::Played {
                    frames,
                    sample_rate,
                },
                Ok(Ok(false)) => PlaybackOutcome::Disposed,
                Ok(Err(e)) => {
                    warn!("Audio output failed: {}", e);
                    PlaybackOutcome::OutputUnavailable(e.to_string())
                }
                Err(e) => {
                    warn!("Audio output task failed: {}", e);
                    PlaybackOutcome::OutputUnavailable(e.to_string())
                }
            }
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle.abort_handle());

        handle
    }

    /// Release the output context and abort playback still in progress.
    /// Idempotent; also runs on drop.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let aborted: Vec<AbortHandle> = self.in_flight.lock().drain(..).collect();
        for handle in &aborted {
            handle.abort();
        }

        let context = self.context.lock().take();
        if let Some(context) = context {
            context.close();
            info!("Released audio output: {}", context.name());
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Whether an output context is currently open
    pub fn has_context(&self) -> bool {
        self.context.lock().is_some()
    }

    /// Existing context, or a new one on first use. `None` once disposed.
    fn acquire_context(&self) -> Result<Option<Arc<dyn OutputContext>>, ChatError> {
        let mut slot = self.context.lock();

        if self.is_disposed() {
            return Ok(None);
        }

        if let Some(context) = slot.as_ref() {
            return Ok(Some(Arc::clone(context)));
        }

        let context = self.factory.create()?;
        info!("Opened audio output: {}", context.name());
        *slot = Some(Arc::clone(&context));

        Ok(Some(context))
    }
}

impl Drop for AudioPlaybackEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
