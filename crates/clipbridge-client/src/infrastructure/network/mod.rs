//! Websocket transport to the relay server.
//!
//! Architecture:
//! - `connect_async` opens the socket; the first server frame must be
//!   `Connected`, after which the client subscribes to the reply queue.
//! - A reader task decodes server frames into [`ClientEvent`]s and forwards
//!   them on an `mpsc` channel.
//! - Commands are written through the sink half, which stays behind a mutex.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use clipbridge_core::protocol::{REPLY_DESTINATION, SEND_MESSAGE_DESTINATION};
use clipbridge_core::{
    decode_server_frame, encode_client_frame, ClientFrame, ClientId, CommandMessage, ServerFrame,
};

use crate::domain::ports::{ClientEvent, ClientNetworkError, MessageService};

/// Capacity of the server event queue.
const EVENT_QUEUE_DEPTH: usize = 32;

/// How long `disconnect` waits for the reader task to observe the close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open session.
struct Connection {
    client_id: ClientId,
    sink: SplitSink<WsStream, WsMessage>,
    reader: JoinHandle<()>,
}

/// [`MessageService`] over a websocket.
pub struct WsMessageService {
    url: String,
    connect_timeout: Duration,
    connection: Mutex<Option<Connection>>,
    events: Mutex<Option<mpsc::Receiver<ClientEvent>>>,
    connected: Arc<AtomicBool>,
}

impl WsMessageService {
    /// Creates a service for `url`; nothing is opened until [`connect`](MessageService::connect).
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            connection: Mutex::new(None),
            events: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Id the server assigned to the current session.
    pub async fn client_id(&self) -> Option<ClientId> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|connection| connection.client_id.clone())
    }

    async fn open(&self) -> Result<Connection, ClientNetworkError> {
        let (ws, _response) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ClientNetworkError::Timeout(self.connect_timeout))?
            .map_err(|e| ClientNetworkError::ConnectFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut stream) = ws.split();

        let client_id = timeout(self.connect_timeout, await_connected(&mut stream))
            .await
            .map_err(|_| ClientNetworkError::Timeout(self.connect_timeout))??;

        let subscribe = encode_client_frame(&ClientFrame::Subscribe {
            destination: REPLY_DESTINATION.to_string(),
        })?;
        sink.send(WsMessage::Text(subscribe))
            .await
            .map_err(|e| ClientNetworkError::WebSocket(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        *self.events.lock().await = Some(rx);
        self.connected.store(true, Ordering::SeqCst);
        let reader = tokio::spawn(read_events(stream, tx, Arc::clone(&self.connected)));

        Ok(Connection {
            client_id,
            sink,
            reader,
        })
    }
}

#[async_trait]
impl MessageService for WsMessageService {
    async fn connect(&self) -> Result<(), ClientNetworkError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() && self.is_connected() {
            return Ok(());
        }
        if let Some(stale) = connection.take() {
            stale.reader.abort();
        }

        let opened = self.open().await?;
        info!("connected to {} as client {}", self.url, opened.client_id);
        *connection = Some(opened);
        Ok(())
    }

    async fn send(&self, command: CommandMessage) -> Result<(), ClientNetworkError> {
        self.connect().await?;
        let text = encode_client_frame(&ClientFrame::Send {
            destination: SEND_MESSAGE_DESTINATION.to_string(),
            body: command,
        })?;

        let mut connection = self.connection.lock().await;
        let Some(connection) = connection.as_mut() else {
            return Err(ClientNetworkError::Closed);
        };
        connection
            .sink
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| {
                self.connected.store(false, Ordering::SeqCst);
                ClientNetworkError::WebSocket(e.to_string())
            })
    }

    async fn next_event(&self) -> Option<ClientEvent> {
        let mut events = self.events.lock().await;
        events.as_mut()?.recv().await
    }

    async fn disconnect(&self) {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return;
        };

        if let Ok(text) = encode_client_frame(&ClientFrame::Disconnect) {
            let _ = connection.sink.send(WsMessage::Text(text)).await;
        }
        let _ = connection.sink.close().await;
        if timeout(CLOSE_GRACE, &mut connection.reader).await.is_err() {
            connection.reader.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("disconnected from {}", self.url);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Reads frames until the server's `Connected` greeting.
async fn await_connected(
    stream: &mut SplitStream<WsStream>,
) -> Result<ClientId, ClientNetworkError> {
    while let Some(message) = stream.next().await {
        match message.map_err(|e| ClientNetworkError::WebSocket(e.to_string()))? {
            WsMessage::Text(text) => {
                return match decode_server_frame(&text)? {
                    ServerFrame::Connected { client_id } => Ok(client_id),
                    other => Err(ClientNetworkError::Handshake(format!(
                        "expected Connected, got {}",
                        other.type_name()
                    ))),
                };
            }
            WsMessage::Close(_) => return Err(ClientNetworkError::Closed),
            _ => {}
        }
    }
    Err(ClientNetworkError::Closed)
}

/// Maps a server frame to the event the application cares about.
fn to_event(frame: ServerFrame) -> Option<ClientEvent> {
    match frame {
        ServerFrame::Message { destination, body } if destination == REPLY_DESTINATION => {
            Some(ClientEvent::Reply(body))
        }
        ServerFrame::Message { destination, .. } => {
            debug!("ignoring message for {destination}");
            None
        }
        ServerFrame::Receipt { accepted, response } => {
            Some(ClientEvent::Receipt { accepted, response })
        }
        ServerFrame::Error { message } => Some(ClientEvent::Error(message)),
        ServerFrame::Connected { .. } => None,
    }
}

/// Reader task body: forwards events until the socket closes, then emits
/// [`ClientEvent::Closed`].
async fn read_events(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<ClientEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("websocket read ended: {e}");
                break;
            }
        };

        let frame = match decode_server_frame(&text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("undecodable server frame: {e}");
                continue;
            }
        };
        if let Some(event) = to_event(frame) {
            if events.send(event).await.is_err() {
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = events.send(ClientEvent::Closed).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipbridge_core::ReplyMessage;

    #[test]
    fn test_reply_destination_becomes_reply_event() {
        let frame = ServerFrame::Message {
            destination: REPLY_DESTINATION.to_string(),
            body: ReplyMessage::new("hi"),
        };
        assert_eq!(
            to_event(frame),
            Some(ClientEvent::Reply(ReplyMessage::new("hi")))
        );
    }

    #[test]
    fn test_other_destinations_are_ignored() {
        let frame = ServerFrame::Message {
            destination: "/topic/other".to_string(),
            body: ReplyMessage::new("hi"),
        };
        assert_eq!(to_event(frame), None);
    }

    #[test]
    fn test_receipt_and_error_map_through() {
        assert_eq!(
            to_event(ServerFrame::Receipt {
                accepted: false,
                response: "no".to_string(),
            }),
            Some(ClientEvent::Receipt {
                accepted: false,
                response: "no".to_string(),
            })
        );
        assert_eq!(
            to_event(ServerFrame::Error {
                message: "bad".to_string(),
            }),
            Some(ClientEvent::Error("bad".to_string()))
        );
    }

    #[tokio::test]
    async fn test_new_service_is_not_connected() {
        let service = WsMessageService::new("ws://127.0.0.1:1/ws", Duration::from_secs(1));
        assert!(!service.is_connected());
        assert_eq!(service.next_event().await, None);
        service.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Arrange: bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let service = WsMessageService::new(format!("ws://{addr}/ws"), Duration::from_secs(2));

        // Act
        let result = service.connect().await;

        // Assert
        assert!(matches!(
            result,
            Err(ClientNetworkError::ConnectFailed { .. })
        ));
        assert!(!service.is_connected());
    }
}
