//! Audio output contexts.
//!
//! `rodio::OutputStream` is `!Send`, so the default output confines it to a
//! dedicated OS thread and exposes a `Send + Sync` handle that forwards
//! commands over a channel.

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::decode::DecodedAudio;
use crate::error::ChatError;

/// A live audio output (device + mixer)
pub trait OutputContext: Send + Sync {
    /// Schedule a clip for immediate playback. Returns once the clip is
    /// queued, not when it finishes.
    fn play(&self, clip: DecodedAudio) -> Result<(), ChatError>;

    /// Release the device. Queued audio is dropped.
    fn close(&self);

    /// Output name for logging
    fn name(&self) -> &str;
}

/// Creates output contexts on demand
pub trait OutputFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn OutputContext>, ChatError>;
}

/// Factory for the default system output device
#[derive(Debug, Clone)]
pub struct RodioOutputFactory {
    volume: f32,
}

impl RodioOutputFactory {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

impl Default for RodioOutputFactory {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl OutputFactory for RodioOutputFactory {
    fn create(&self) -> Result<Arc<dyn OutputContext>, ChatError> {
        Ok(Arc::new(RodioOutput::spawn(self.volume)?))
    }
}

enum OutputCommand {
    Play {
        clip: DecodedAudio,
        reply: mpsc::Sender<Result<(), ChatError>>,
    },
    Shutdown,
}

/// Handle to the audio output thread
pub struct RodioOutput {
    cmd_tx: mpsc::Sender<OutputCommand>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RodioOutput {
    /// Spawn the output thread and open the default device on it
    pub fn spawn(volume: f32) -> Result<Self, ChatError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("translate-chat-audio".into())
            .spawn(move || Self::run(volume, cmd_rx, init_tx))
            .map_err(|e| ChatError::AudioOutput(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| {
            ChatError::AudioOutput("audio thread exited during startup".to_string())
        })??;

        Ok(Self {
            cmd_tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn run(
        volume: f32,
        cmd_rx: mpsc::Receiver<OutputCommand>,
        init_tx: mpsc::Sender<Result<(), ChatError>>,
    ) {
        let (_stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(ChatError::AudioOutput(e.to_string())));
                return;
            }
        };

        info!("Audio output opened on default device");
        let _ = init_tx.send(Ok(()));

        while let Ok(command) = cmd_rx.recv() {
            match command {
                OutputCommand::Play { clip, reply } => {
                    let result = Sink::try_new(&handle)
                        .map(|sink| {
                            sink.set_volume(volume);
                            sink.append(SamplesBuffer::new(
                                clip.channels,
                                clip.sample_rate,
                                clip.samples,
                            ));
                            sink.detach();
                        })
                        .map_err(|e| ChatError::AudioOutput(e.to_string()));
                    let _ = reply.send(result);
                }
                OutputCommand::Shutdown => break,
            }
        }

        info!("Audio output closed");
    }
}

impl OutputContext for RodioOutput {
    fn play(&self, clip: DecodedAudio) -> Result<(), ChatError> {
        debug!("Queueing {:.2}s clip", clip.duration_seconds());

        let (reply, result) = mpsc::channel();
        self.cmd_tx
            .send(OutputCommand::Play { clip, reply })
            .map_err(|_| ChatError::AudioOutput("audio thread is gone".to_string()))?;

        result
            .recv()
            .map_err(|_| ChatError::AudioOutput("audio thread is gone".to_string()))?
    }

    fn close(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };

        if self.cmd_tx.send(OutputCommand::Shutdown).is_err() {
            warn!("Audio thread already stopped");
        }

        // Not joined: the thread only drops the stream on its way out
        drop(thread);
    }

    fn name(&self) -> &str {
        "rodio default output"
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.close();
    }
}
