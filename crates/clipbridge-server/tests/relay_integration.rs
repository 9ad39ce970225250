//! End-to-end tests of the websocket endpoint with a fake Telegram bot.
//!
//! Each test starts the real accept loop on a loopback port and talks to it
//! with a `tokio-tungstenite` client, or with `reqwest` for the HTTP endpoint.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use clipbridge_core::protocol::{MAX_FRAME_BYTES, REPLY_DESTINATION, SEND_MESSAGE_DESTINATION};
use clipbridge_core::{
    decode_server_frame, encode_client_frame, ClientFrame, ClientId, CommandMessage, ServerFrame,
};
use clipbridge_server::application::notifier::{PROMPT_REPLY, REPLY_DELIVERED};
use clipbridge_server::application::{CommandProcessor, SessionRegistry, TelegramNotifier};
use clipbridge_server::domain::{
    CallbackQuery, Chat, InlineKeyboardMarkup, Message, TelegramBotApi, Update, User, UserId,
};
use clipbridge_server::infrastructure::{serve, ServerContext, SessionHub};

const TELEGRAM_USER: UserId = 42;
const FRAME_WAIT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct SentMessage {
    chat_id: UserId,
    text: String,
    with_button: bool,
}

#[derive(Default)]
struct FakeBot {
    sent: Mutex<Vec<SentMessage>>,
    /// When set, every send is refused.
    offline: AtomicBool,
}

impl FakeBot {
    fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, chat_id: UserId, text: &str, with_button: bool) -> bool {
        if self.offline.load(Ordering::Relaxed) {
            return false;
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            with_button,
        });
        true
    }
}

#[async_trait]
impl TelegramBotApi for FakeBot {
    async fn send_message(&self, chat_id: UserId, text: &str) -> bool {
        self.record(chat_id, text, false)
    }

    async fn send_message_with_markup(
        &self,
        chat_id: UserId,
        text: &str,
        _markup: &InlineKeyboardMarkup,
    ) -> bool {
        self.record(chat_id, text, true)
    }

    async fn answer_callback(&self, _callback_id: &str) -> bool {
        true
    }

    async fn bot_users(&self) -> Vec<UserId> {
        vec![TELEGRAM_USER]
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Relay {
    addr: SocketAddr,
    bot: Arc<FakeBot>,
    notifier: Arc<TelegramNotifier>,
    running: Arc<AtomicBool>,
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn start_relay() -> Relay {
    let sessions = SessionRegistry::shared();
    let hub = Arc::new(SessionHub::new(Arc::clone(&sessions)));
    let bot = Arc::new(FakeBot::default());
    let notifier = Arc::new(TelegramNotifier::new(
        bot.clone(),
        Arc::clone(&sessions),
        hub.clone(),
    ));
    let processor = Arc::new(CommandProcessor::new(notifier.clone()));
    let ctx = Arc::new(ServerContext::new(
        sessions,
        hub,
        processor,
        notifier.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve(listener, ctx, Arc::clone(&running)));

    Relay {
        addr,
        bot,
        notifier,
        running,
    }
}

async fn connect(relay: &Relay) -> (Client, ClientId) {
    let (mut ws, _) = connect_async(format!("ws://{}/ws", relay.addr))
        .await
        .unwrap();
    match next_frame(&mut ws).await {
        ServerFrame::Connected { client_id } => (ws, client_id),
        other => panic!("expected Connected, got {other:?}"),
    }
}

async fn send(ws: &mut Client, frame: &ClientFrame) {
    let text = encode_client_frame(frame).unwrap();
    ws.send(WsMessage::Text(text)).await.unwrap();
}

async fn next_frame(ws: &mut Client) -> ServerFrame {
    loop {
        let message = timeout(FRAME_WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let WsMessage::Text(text) = message {
            return decode_server_frame(&text).unwrap();
        }
    }
}

fn dm(content: &str) -> ClientFrame {
    ClientFrame::Send {
        destination: SEND_MESSAGE_DESTINATION.to_string(),
        body: CommandMessage::direct(content, TELEGRAM_USER),
    }
}

fn telegram_user() -> User {
    User {
        id: TELEGRAM_USER,
        is_bot: false,
        first_name: "Tester".to_string(),
        username: None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_receives_connected_frame_with_fresh_id() {
    // Arrange
    let relay = start_relay().await;

    // Act
    let (_first, first_id) = connect(&relay).await;
    let (_second, second_id) = connect(&relay).await;

    // Assert
    assert!(first_id.is_known());
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn test_direct_message_is_forwarded_and_acknowledged() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, client_id) = connect(&relay).await;

    // Act
    send(&mut ws, &dm("clipboard text")).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    assert_eq!(
        receipt,
        ServerFrame::Receipt {
            accepted: true,
            response: "Message sent to the specified Telegram user".to_string(),
        }
    );
    let sent = relay.bot.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, TELEGRAM_USER);
    assert!(sent[0].with_button);
    assert!(sent[0].text.contains("clipboard text"));
    assert!(sent[0].text.contains(client_id.as_str()));
}

#[tokio::test]
async fn test_command_without_target_is_rejected_in_receipt() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;
    let frame = ClientFrame::Send {
        destination: SEND_MESSAGE_DESTINATION.to_string(),
        body: CommandMessage {
            command: Some("dm".to_string()),
            content: Some("hi".to_string()),
            ..CommandMessage::default()
        },
    };

    // Act
    send(&mut ws, &frame).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    assert!(matches!(receipt, ServerFrame::Receipt { accepted: false, .. }));
    assert!(relay.bot.sent().is_empty());
}

#[tokio::test]
async fn test_telegram_reply_is_routed_back_to_client() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, client_id) = connect(&relay).await;
    send(
        &mut ws,
        &ClientFrame::Subscribe {
            destination: REPLY_DESTINATION.to_string(),
        },
    )
    .await;
    send(&mut ws, &dm("question")).await;
    next_frame(&mut ws).await;

    // Act: press Reply, then type the answer
    relay
        .notifier
        .handle_update(&Update {
            update_id: 1,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb-1".to_string(),
                from: telegram_user(),
                data: Some(format!("reply:{client_id}")),
            }),
        })
        .await;
    relay
        .notifier
        .handle_update(&Update {
            update_id: 2,
            message: Some(Message {
                message_id: 10,
                from: Some(telegram_user()),
                chat: Chat { id: TELEGRAM_USER },
                text: Some("the answer".to_string()),
            }),
            callback_query: None,
        })
        .await;
    let reply = next_frame(&mut ws).await;

    // Assert
    assert_eq!(
        reply,
        ServerFrame::Message {
            destination: REPLY_DESTINATION.to_string(),
            body: clipbridge_core::ReplyMessage::new("the answer"),
        }
    );
    let texts: Vec<String> = relay.bot.sent().into_iter().map(|m| m.text).collect();
    assert!(texts.iter().any(|t| t == PROMPT_REPLY));
    assert!(texts.iter().any(|t| t == REPLY_DELIVERED));
}

#[tokio::test]
async fn test_malformed_json_yields_error_and_session_survives() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;

    // Act
    ws.send(WsMessage::Text("{not json".to_string()))
        .await
        .unwrap();
    let error = next_frame(&mut ws).await;
    send(&mut ws, &dm("still here")).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    assert!(matches!(error, ServerFrame::Error { .. }));
    assert!(matches!(receipt, ServerFrame::Receipt { accepted: true, .. }));
}

#[tokio::test]
async fn test_send_to_unknown_destination_yields_error() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;

    // Act
    send(
        &mut ws,
        &ClientFrame::Send {
            destination: "/app/elsewhere".to_string(),
            body: CommandMessage::direct("x", TELEGRAM_USER),
        },
    )
    .await;
    let frame = next_frame(&mut ws).await;

    // Assert
    assert!(matches!(frame, ServerFrame::Error { .. }));
    assert!(relay.bot.sent().is_empty());
}

#[tokio::test]
async fn test_upgrade_on_other_path_is_refused_with_404() {
    // Arrange
    let relay = start_relay().await;

    // Act
    let result = connect_async(format!("ws://{}/other", relay.addr)).await;

    // Assert
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 404),
        Err(other) => panic!("expected HTTP 404, got {other}"),
        Ok(_) => panic!("upgrade on a foreign path must fail"),
    }
}

#[tokio::test]
async fn test_reply_after_disconnect_is_not_delivered() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, client_id) = connect(&relay).await;
    send(&mut ws, &ClientFrame::Disconnect).await;
    // Wait for the server to close its side.
    while let Ok(Some(Ok(_))) = timeout(FRAME_WAIT, ws.next()).await {}

    // Act
    relay
        .notifier
        .handle_update(&Update {
            update_id: 3,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb-late".to_string(),
                from: telegram_user(),
                data: Some(format!("reply:{client_id}")),
            }),
        })
        .await;

    // Assert
    assert_eq!(relay.notifier.pending_reply_of(TELEGRAM_USER).await, None);
}

#[tokio::test]
async fn test_binary_frame_yields_error_and_session_survives() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;

    // Act
    ws.send(WsMessage::Binary(vec![0xde, 0xad])).await.unwrap();
    let error = next_frame(&mut ws).await;
    send(&mut ws, &dm("after binary")).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    assert!(matches!(error, ServerFrame::Error { .. }));
    assert!(matches!(receipt, ServerFrame::Receipt { accepted: true, .. }));
}

#[tokio::test]
async fn test_oversized_frame_yields_error_and_session_survives() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;
    let oversized = "x".repeat(MAX_FRAME_BYTES + 1);

    // Act
    ws.send(WsMessage::Text(oversized)).await.unwrap();
    let error = next_frame(&mut ws).await;
    send(&mut ws, &dm("small again")).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    match error {
        ServerFrame::Error { message } => assert!(message.contains("too large"), "{message}"),
        other => panic!("expected Error, got {other:?}"),
    }
    assert!(matches!(receipt, ServerFrame::Receipt { accepted: true, .. }));
    assert_eq!(relay.bot.sent().len(), 1);
}

#[tokio::test]
async fn test_http_send_broadcasts_body_to_bot_users() {
    // Arrange
    let relay = start_relay().await;

    // Act
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/messages/send", relay.addr))
        .body("maintenance at 18:00")
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body = response.text().await.unwrap();

    // Assert
    assert_eq!(status, 200);
    assert_eq!(body, "Message sent to 1 users");
    assert_eq!(
        relay.bot.sent(),
        vec![SentMessage {
            chat_id: TELEGRAM_USER,
            text: "maintenance at 18:00".to_string(),
            with_button: false,
        }]
    );
}

#[tokio::test]
async fn test_http_send_without_recipients_is_bad_request() {
    // Arrange
    let relay = start_relay().await;
    relay.bot.offline.store(true, Ordering::Relaxed);

    // Act
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/messages/send", relay.addr))
        .body("nobody listens")
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_http_endpoint_and_websocket_share_the_port() {
    // Arrange
    let relay = start_relay().await;
    let (mut ws, _) = connect(&relay).await;

    // Act
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/messages/send", relay.addr))
        .body("hello everyone")
        .send()
        .await
        .unwrap();
    send(&mut ws, &dm("still connected")).await;
    let receipt = next_frame(&mut ws).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert!(matches!(receipt, ServerFrame::Receipt { accepted: true, .. }));
}
