use super::config::SessionConfig;
use super::state::{ConnectionState, NORMAL_CLOSURE};
use super::stats::{SessionCounters, SessionStats};
use super::transport::{Connector, Transport, TransportEvent};
use crate::codec::{self, OutgoingRequest};
use crate::error::ChatError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, info, warn};

/// Handler for inbound text frames
pub type MessageHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Handler for state transitions
pub type StateHandler = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    message: Option<MessageHandler>,
    state: Option<StateHandler>,
}

/// State shared between the session handle and its driver task.
/// Only the driver (or a close before `open`) writes the state.
struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    handlers: Mutex<Handlers>,
    counters: SessionCounters,
    started_at: DateTime<Utc>,
}

impl Shared {
    fn transition(&self, next: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next.clone();
            true
        });

        if !changed {
            return;
        }

        info!("Connection state: {}", next);

        let handler = self.handlers.lock().state.clone();
        if let Some(handler) = handler {
            handler(&next);
        }
    }

    fn deliver(&self, frame: String) {
        SessionCounters::bump(&self.counters.frames_received);

        let handler = self.handlers.lock().message.clone();
        match handler {
            Some(handler) => handler(frame),
            None => debug!("No message handler registered, dropping frame"),
        }
    }
}

enum Command {
    Send {
        frame: String,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    Close {
        code: u16,
        reason: String,
        done: oneshot::Sender<()>,
    },
}

/// A single persistent connection to the translation service
///
/// The session owns one driver task which is the only writer of the
/// connection state. Abnormal closures and transport errors are absorbed into
/// a fixed-delay reconnect loop; callers observe them through
/// [`on_state_change`](Self::on_state_change) or [`watch_state`](Self::watch_state).
///
/// Dropping the session is equivalent to `close(1000, "session dropped")`.
pub struct ConnectionSession {
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    /// Receiver half, handed to the driver on `open`
    pending: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl ConnectionSession {
    /// Create an idle session
    pub fn new(connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
        let (commands, pending) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            connector,
            config,
            shared: Arc::new(Shared {
                state_tx,
                handlers: Mutex::new(Handlers::default()),
                counters: SessionCounters::default(),
                started_at: Utc::now(),
            }),
            commands,
            pending: Mutex::new(Some(pending)),
        }
    }

    /// Start connecting to `url`
    ///
    /// Never fails: connect errors are retried after the reconnect delay.
    /// Must be called from within a tokio runtime. Only the first call has
    /// an effect.
    pub fn open(&self, url: &str) {
        let pending = self.pending.lock().take();
        let Some(commands) = pending else {
            warn!("Session already opened or closed, ignoring open({})", url);
            return;
        };

        info!("Opening session to {}", url);
        self.shared.transition(ConnectionState::Connecting);

        let driver = SessionDriver {
            url: url.to_string(),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            commands,
        };

        tokio::spawn(driver.run());
    }

    /// Encode and send a chat request
    pub async fn send(&self, request: &OutgoingRequest) -> Result<(), ChatError> {
        let frame = codec::encode_request(request)?;
        self.send_frame(frame).await
    }

    /// Send a raw text frame
    ///
    /// Fails with `NotConnected` unless the session is open. Nothing is
    /// queued for later delivery.
    pub async fn send_frame(&self, frame: String) -> Result<(), ChatError> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }

        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, reply })
            .map_err(|_| ChatError::NotConnected)?;

        // A dropped reply means the driver left the open phase first
        result.await.unwrap_or(Err(ChatError::NotConnected))
    }

    /// Close the session: `Closing`, then `Closed { code, reason }`
    ///
    /// Terminal. Cancels a pending reconnect. Returns once the state is `Closed`.
    pub async fn close(&self, code: u16, reason: &str) {
        if self.state().is_terminal() {
            return;
        }

        // Never opened: no driver to talk to
        let never_opened = self.pending.lock().take().is_some();
        if never_opened {
            self.shared.transition(ConnectionState::Closing);
            self.shared.transition(ConnectionState::Closed {
                code,
                reason: reason.to_string(),
            });
            return;
        }

        let (done, finished) = oneshot::channel();
        let command = Command::Close {
            code,
            reason: reason.to_string(),
            done,
        };

        if self.commands.send(command).is_ok() {
            let _ = finished.await;
        }
    }

    /// Register the inbound frame handler, replacing any previous one
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.shared.handlers.lock().message = Some(Arc::new(handler));
    }

    /// Register the state transition handler, replacing any previous one
    pub fn on_state_change<F>(&self, handler: F)
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.shared.handlers.lock().state = Some(Arc::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state_tx.borrow().is_open()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot(self.shared.started_at)
    }
}

enum Phase {
    Connect,
    Open(Box<dyn Transport>),
    /// Waiting out the single pending reconnect timer
    Backoff(Pin<Box<Sleep>>),
    Shutdown {
        code: u16,
        reason: String,
        done: Option<oneshot::Sender<()>>,
    },
    Finished,
}

struct SessionDriver {
    url: String,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl SessionDriver {
    async fn run(mut self) {
        let mut phase = Phase::Connect;

        loop {
            phase = match phase {
                Phase::Connect => self.connect().await,
                Phase::Open(transport) => self.serve(transport).await,
                Phase::Backoff(timer) => self.backoff(timer).await,
                Phase::Shutdown { code, reason, done } => {
                    self.shared.transition(ConnectionState::Closing);
                    self.shared.transition(ConnectionState::Closed { code, reason });
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    break;
                }
                Phase::Finished => break,
            };
        }

        debug!("Session driver for {} stopped", self.url);
    }

    async fn connect(&mut self) -> Phase {
        SessionCounters::bump(&self.shared.counters.connect_attempts);

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let limit = self.config.connect_timeout;

        let attempt = async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, connector.connect(&url))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ChatError::Transport(format!(
                            "connect timed out after {limit:?}"
                        )))
                    }),
                None => connector.connect(&url).await,
            }
        };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(transport) => {
                            SessionCounters::bump(&self.shared.counters.connections_opened);
                            self.shared.transition(ConnectionState::Open);
                            Phase::Open(transport)
                        }
                        Err(e) => {
                            warn!("Connect attempt failed: {}", e);
                            self.schedule_reconnect()
                        }
                    };
                }
                command = self.commands.recv() => {
                    if let Some(phase) = Self::reject_or_shutdown(command) {
                        return phase;
                    }
                }
            }
        }
    }

    async fn serve(&mut self, mut transport: Box<dyn Transport>) -> Phase {
        loop {
            tokio::select! {
                event = transport.next_event() => match event {
                    TransportEvent::Frame(frame) => self.shared.deliver(frame),
                    TransportEvent::Closed { code, reason } if code == NORMAL_CLOSURE => {
                        info!("Server closed the connection: {}", reason);
                        self.shared.transition(ConnectionState::Closed { code, reason });
                        return Phase::Finished;
                    }
                    TransportEvent::Closed { code, reason } => {
                        warn!("Connection lost (code {}): {}", code, reason);
                        return self.schedule_reconnect();
                    }
                    TransportEvent::Failed(e) => {
                        warn!("Transport error, forcing close: {}", e);
                        drop(transport);
                        return self.schedule_reconnect();
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send { frame, reply }) => match transport.send(frame).await {
                        Ok(()) => {
                            SessionCounters::bump(&self.shared.counters.frames_sent);
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            warn!("Send failed, forcing close: {}", e);
                            let _ = reply.send(Err(e));
                            drop(transport);
                            return self.schedule_reconnect();
                        }
                    },
                    Some(Command::Close { code, reason, done }) => {
                        self.close_transport(transport, code, reason).await;
                        let _ = done.send(());
                        return Phase::Finished;
                    }
                    None => {
                        self.close_transport(transport, NORMAL_CLOSURE, "session dropped".to_string())
                            .await;
                        return Phase::Finished;
                    }
                },
            }
        }
    }

    async fn backoff(&mut self, mut timer: Pin<Box<Sleep>>) -> Phase {
        loop {
            tokio::select! {
                _ = &mut timer => return Phase::Connect,
                command = self.commands.recv() => {
                    if let Some(phase) = Self::reject_or_shutdown(command) {
                        return phase;
                    }
                }
            }
        }
    }

    /// Replaces whatever timer was pending; the phase holds at most one.
    fn schedule_reconnect(&self) -> Phase {
        SessionCounters::bump(&self.shared.counters.reconnects_scheduled);
        self.shared.transition(ConnectionState::Connecting);

        info!(
            "Reconnecting to {} in {:?}",
            self.url, self.config.reconnect_delay
        );

        Phase::Backoff(Box::pin(tokio::time::sleep(self.config.reconnect_delay)))
    }

    /// Commands arriving while not open: sends are rejected, close shuts down
    fn reject_or_shutdown(command: Option<Command>) -> Option<Phase> {
        match command {
            Some(Command::Send { reply, .. }) => {
                let _ = reply.send(Err(ChatError::NotConnected));
                None
            }
            Some(Command::Close { code, reason, done }) => Some(Phase::Shutdown {
                code,
                reason,
                done: Some(done),
            }),
            None => Some(Phase::Shutdown {
                code: NORMAL_CLOSURE,
                reason: "session dropped".to_string(),
                done: None,
            }),
        }
    }

    /// An unresponsive peer cannot hold the close past `close_timeout`
    async fn close_transport(&self, mut transport: Box<dyn Transport>, code: u16, reason: String) {
        self.shared.transition(ConnectionState::Closing);

        let limit = self.config.close_timeout;
        if tokio::time::timeout(limit, transport.close(code, &reason))
            .await
            .is_err()
        {
            warn!("Close handshake timed out after {:?}, dropping connection", limit);
        }

        drop(transport);
        self.shared.transition(ConnectionState::Closed { code, reason });
    }
}
