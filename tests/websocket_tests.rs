mod common;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use common::{eventually, wait_for_state};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use translate_chat::codec::{decode_request, encode_event};
use translate_chat::connection::{ConnectionSession, ConnectionState, SessionConfig};
use translate_chat::{
    ChatEvent, ChatSessionController, ChatTurn, IncomingEvent, LanguageCode, Origin,
    WebSocketConnector,
};

#[derive(Clone)]
struct MockService {
    connections: Arc<AtomicUsize>,
    /// Connections numbered up to this are dropped right after the upgrade
    drop_first: usize,
}

async fn ws_handler(ws: WebSocketUpgrade, State(service): State<MockService>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, service))
}

/// Translates by tagging the text with the target language.
/// `/bye` closes normally, `/garbage` answers with a non-JSON frame.
async fn serve_socket(mut socket: WebSocket, service: MockService) {
    let n = service.connections.fetch_add(1, Ordering::SeqCst) + 1;
    if n <= service.drop_first {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(request) = decode_request(&text) else { continue };

        let reply = match request.text.as_str() {
            "/bye" => {
                let close = CloseFrame {
                    code: 1000,
                    reason: "bye".into(),
                };
                let _ = socket.send(Message::Close(Some(close))).await;
                return;
            }
            "/garbage" => "{not json".to_string(),
            text => encode_event(&IncomingEvent {
                original_text: text.to_string(),
                translated_text: format!("[{}] {}", request.target_language, text),
                audio_bytes: None,
            })
            .unwrap(),
        };

        if socket.send(Message::Text(reply)).await.is_err() {
            return;
        }
    }
}

async fn spawn_service(drop_first: usize) -> (String, Arc<AtomicUsize>) {
    let connections = Arc::new(AtomicUsize::new(0));
    let service = MockService {
        connections: Arc::clone(&connections),
        drop_first,
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), connections)
}

fn controller() -> (ChatSessionController, mpsc::UnboundedReceiver<ChatEvent>) {
    let config = SessionConfig {
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Some(Duration::from_secs(5)),
        ..SessionConfig::default()
    };
    let session = ConnectionSession::new(Arc::new(WebSocketConnector::new()), config);
    ChatSessionController::new(session, None)
}

async fn next_remote_turn(events: &mut mpsc::UnboundedReceiver<ChatEvent>) -> ChatTurn {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Some(ChatEvent::TurnAppended(turn)) if turn.origin == Origin::Remote => {
                    return turn
                }
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a translation")
}

fn is_open(state: &ConnectionState) -> bool {
    state.is_open()
}

#[tokio::test]
async fn test_translation_round_trip() {
    let (url, connections) = spawn_service(0).await;
    let (controller, mut events) = controller();
    let german = LanguageCode::new("de").unwrap();

    controller.open(&url);
    wait_for_state(controller.session(), is_open).await;

    controller.send_text("good morning", &german).await.unwrap();
    let turn = next_remote_turn(&mut events).await;

    assert_eq!(turn.original_text, "good morning");
    assert_eq!(turn.translated_text, "[de] good morning");

    let history = controller.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].origin, Origin::Local);
    assert_eq!(history[1].origin, Origin::Remote);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnects_after_dropped_connection() {
    let (url, connections) = spawn_service(1).await;
    let (controller, mut events) = controller();
    let french = LanguageCode::new("fr").unwrap();

    controller.open(&url);

    eventually(|| connections.load(Ordering::SeqCst) >= 2).await;
    wait_for_state(controller.session(), is_open).await;
    assert!(controller.session().stats().reconnects_scheduled >= 1);

    controller.send_text("hello", &french).await.unwrap();
    let turn = next_remote_turn(&mut events).await;
    assert_eq!(turn.translated_text, "[fr] hello");
}

#[tokio::test]
async fn test_server_normal_close_is_final() {
    let (url, connections) = spawn_service(0).await;
    let (controller, _events) = controller();
    let french = LanguageCode::new("fr").unwrap();

    controller.open(&url);
    wait_for_state(controller.session(), is_open).await;

    controller.send_text("/bye", &french).await.unwrap();
    wait_for_state(controller.session(), |state| {
        matches!(state, ConnectionState::Closed { code: 1000, .. })
    })
    .await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert!(!controller.is_connected());
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() {
    let (url, _connections) = spawn_service(0).await;
    let (controller, mut events) = controller();
    let italian = LanguageCode::new("it").unwrap();

    controller.open(&url);
    wait_for_state(controller.session(), is_open).await;

    controller.send_text("/garbage", &italian).await.unwrap();
    controller.send_text("thank you", &italian).await.unwrap();

    let turn = next_remote_turn(&mut events).await;
    assert_eq!(turn.translated_text, "[it] thank you");
    assert!(controller.is_connected());
    assert_eq!(controller.stats().dropped_events, 1);
    assert_eq!(controller.stats().remote_turns, 1);
}

#[tokio::test]
async fn test_client_close_stops_reconnecting() {
    let (url, connections) = spawn_service(0).await;
    let (controller, _events) = controller();

    controller.open(&url);
    wait_for_state(controller.session(), is_open).await;

    controller.shutdown().await;
    assert_eq!(
        controller.connection_state(),
        ConnectionState::Closed {
            code: 1000,
            reason: "client shutdown".to_string()
        }
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_service_keeps_retrying() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (controller, _events) = controller();
    controller.open(&format!("ws://{addr}/ws"));

    eventually(|| controller.session().stats().connect_attempts >= 3).await;
    assert_eq!(controller.connection_state(), ConnectionState::Connecting);

    controller.shutdown().await;
    assert!(controller.connection_state().is_terminal());
}
