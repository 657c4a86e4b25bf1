use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::state::ABNORMAL_CLOSURE;
use crate::error::ChatError;

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame, in receipt order
    Frame(String),
    /// The peer closed the connection (or it dropped, reported as 1006)
    Closed { code: u16, reason: String },
    /// Read failure; treated by the session as an abnormal closure
    Failed(String),
}

/// An established bidirectional connection
///
/// `next_event` must be cancel-safe: the session polls it inside `select!`.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: String) -> Result<(), ChatError>;

    async fn next_event(&mut self) -> TransportEvent;

    /// Start the close handshake; errors are ignored
    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens transports
///
/// Implementations:
/// - `WebSocketConnector`: tokio-tungstenite client
/// - test connectors backed by in-memory channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ChatError>;
}

/// WebSocket connector
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ChatError> {
        info!("Connecting to {}", url);

        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ChatError::Transport(format!("failed to connect to {url}: {e}")))?;

        info!("Connected to {} (status {})", url, response.status());

        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// WebSocket transport over a tungstenite stream
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChatError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| ChatError::Transport(format!("failed to send frame: {e}")))
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Frame(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return TransportEvent::Frame(text),
                    Err(_) => warn!("Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (u16::from(CloseCode::Status), String::new()),
                    };
                    return TransportEvent::Closed { code, reason };
                }
                // Pings are answered by tungstenite on the next read
                Some(Ok(other)) => debug!("Ignoring control frame: {:?}", other),
                Some(Err(e)) => return TransportEvent::Failed(e.to_string()),
                None => {
                    return TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "connection dropped".to_string(),
                    }
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };

        if let Err(e) = self.stream.close(Some(frame)).await {
            debug!("Close handshake failed: {}", e);
        }
    }
}
