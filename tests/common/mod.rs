// Shared test doubles: an in-memory transport, a recording audio output and
// WAV fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use translate_chat::audio::{DecodedAudio, OutputContext, OutputFactory};
use translate_chat::connection::{
    ConnectionSession, ConnectionState, Connector, Transport, TransportEvent, ABNORMAL_CLOSURE,
};
use translate_chat::ChatError;

/// Server side of one fake connection
pub struct FakePeer {
    pub events: mpsc::UnboundedSender<TransportEvent>,
    pub sent: mpsc::UnboundedReceiver<String>,
    pub closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl FakePeer {
    pub fn push(&self, frame: &str) {
        let _ = self.events.send(TransportEvent::Frame(frame.to_string()));
    }

    pub fn close_with(&self, code: u16, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn fail(&self, error: &str) {
        let _ = self.events.send(TransportEvent::Failed(error.to_string()));
    }

    pub fn close_frame(&self) -> Option<(u16, String)> {
        self.closed.lock().clone()
    }
}

struct FakeTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
    stall_close: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChatError> {
        self.sent
            .send(frame)
            .map_err(|_| ChatError::Transport("peer stopped reading".to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed {
                code: ABNORMAL_CLOSURE,
                reason: "peer dropped".to_string(),
            })
    }

    async fn close(&mut self, code: u16, reason: &str) {
        *self.closed.lock() = Some((code, reason.to_string()));
        if self.stall_close.load(Ordering::SeqCst) {
            // Peer never completes the close handshake
            std::future::pending::<()>().await;
        }
    }
}

/// Connector handing each new connection's peer to the test
pub struct FakeConnector {
    attempts: AtomicUsize,
    failures: AtomicUsize,
    stall_close: Arc<AtomicBool>,
    peers: mpsc::UnboundedSender<FakePeer>,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            stall_close: Arc::new(AtomicBool::new(false)),
            peers,
        });
        (connector, peers_rx)
    }

    /// Refuse the next `n` connect attempts
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Transports never finish their close handshake
    pub fn stall_close(&self) {
        self.stall_close.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, ChatError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChatError::Transport("connection refused".to_string()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(Mutex::new(None));

        let _ = self.peers.send(FakePeer {
            events: events_tx,
            sent: sent_rx,
            closed: Arc::clone(&closed),
        });

        Ok(Box::new(FakeTransport {
            events: events_rx,
            sent: sent_tx,
            closed,
            stall_close: Arc::clone(&self.stall_close),
        }))
    }
}

/// Wait (bounded) until the session state satisfies `pred`
pub async fn wait_for_state<F>(session: &ConnectionSession, pred: F)
where
    F: FnMut(&ConnectionState) -> bool,
{
    let mut rx = session.watch_state();
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<FakePeer>) -> FakePeer {
    tokio::time::timeout(Duration::from_secs(30), peers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

/// Records every clip it is asked to play
#[derive(Default)]
pub struct RecordingOutput {
    pub clips: Mutex<Vec<DecodedAudio>>,
    pub closed: AtomicBool,
}

impl OutputContext for RecordingOutput {
    fn play(&self, clip: DecodedAudio) -> Result<(), ChatError> {
        self.clips.lock().push(clip);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "recording output"
    }
}

#[derive(Default)]
pub struct RecordingOutputFactory {
    pub created: AtomicUsize,
    pub output: Arc<RecordingOutput>,
    pub unavailable: AtomicBool,
}

impl RecordingOutputFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> usize {
        self.output.clips.lock().len()
    }
}

impl OutputFactory for RecordingOutputFactory {
    fn create(&self) -> Result<Arc<dyn OutputContext>, ChatError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChatError::AudioOutput("no output device".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.output) as Arc<dyn OutputContext>)
    }
}

/// A 440 Hz tone as a 16-bit PCM WAV file
pub fn tone_wav(duration_ms: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = sample_rate * duration_ms / 1000;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = ((2.0 * PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Poll `check` until it holds, bounded
pub async fn eventually<F: FnMut() -> bool>(mut check: F) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
