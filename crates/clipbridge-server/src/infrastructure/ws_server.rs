//! Websocket endpoint: accept loop and per-session tasks.
//!
//! A connection that does not open with `GET` is a plain HTTP request and is
//! handed to [`rest`](super::rest).  Every other connection is upgraded on
//! [`WS_PATH`] only, assigned a fresh [`ClientId`], and then runs two halves:
//!
//! - **reader** (this task): decodes [`ClientFrame`]s, dispatches `Send`
//!   frames to the [`MessageProcessor`], and answers with `Receipt`/`Error`.
//! - **writer** (spawned task): drains the session's outbound queue and
//!   writes each [`ServerFrame`] as a text frame.  The [`SessionHub`] holds a
//!   clone of the queue so Telegram replies reach the session from other tasks.
//!
//! Shutdown is driven by the shared `running` flag, polled between accepts.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipbridge_core::domain::tag_option_with_client;
use clipbridge_core::protocol::{SEND_MESSAGE_DESTINATION, WS_PATH};
use clipbridge_core::{
    decode_client_frame, encode_server_frame, ClientFrame, ClientId, ServerFrame,
};

use crate::application::{MessageProcessor, SessionLifecycle, SharedSessions};
use crate::domain::config::ServerConfig;
use crate::domain::ports::NotificationService;
use crate::infrastructure::hub::SessionHub;
use crate::infrastructure::rest;

/// How long the accept loop waits before re-checking the `running` flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Capacity of each session's outbound frame queue.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// How long a finished session waits for its writer to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything a session task needs, shared across all sessions.
pub struct ServerContext {
    pub sessions: SharedSessions,
    pub lifecycle: Mutex<SessionLifecycle>,
    pub hub: Arc<SessionHub>,
    pub processor: Arc<dyn MessageProcessor>,
    /// Target of `POST /api/messages/send`.
    pub notifications: Arc<dyn NotificationService>,
}

impl ServerContext {
    pub fn new(
        sessions: SharedSessions,
        hub: Arc<SessionHub>,
        processor: Arc<dyn MessageProcessor>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            sessions,
            lifecycle: Mutex::new(SessionLifecycle::new()),
            hub,
            processor,
            notifications,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves websocket sessions until `running`
/// is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: &ServerConfig,
    ctx: Arc<ServerContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind websocket listener on {}", config.bind_addr))?;

    info!("websocket endpoint listening on {}", config.local_ws_url());
    serve(listener, ctx, running).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    if !rest::is_plain_http(&stream).await {
        handle_session(stream, peer_addr, ctx).await;
        return;
    }
    match rest::serve_http(stream, Arc::clone(&ctx.notifications)).await {
        Ok(()) => debug!("HTTP request from {peer_addr} answered"),
        Err(e) => warn!("HTTP request from {peer_addr} failed: {e:#}"),
    }
}

async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    match run_session(stream, peer_addr, ctx).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    let ws_stream = accept_hdr_async(stream, check_path)
        .await
        .with_context(|| format!("websocket handshake failed with {peer_addr}"))?;

    let client_id = ClientId::generate();
    let session_key = Uuid::new_v4().to_string();
    info!("session {peer_addr} established as client {client_id}");

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (frames_tx, frames_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    let writer = tokio::spawn(write_frames(ws_tx, frames_rx, client_id.clone()));

    enqueue(
        &frames_tx,
        ServerFrame::Connected {
            client_id: client_id.clone(),
        },
    )
    .await?;
    {
        let mut lifecycle = ctx.lifecycle.lock().await;
        let mut sessions = ctx.sessions.lock().await;
        lifecycle.on_connected(&mut sessions, &client_id);
    }
    ctx.hub.attach(client_id.clone(), frames_tx.clone()).await;

    let outcome = read_frames(&mut ws_rx, &ctx, &client_id, &frames_tx).await;

    ctx.hub.detach(&client_id).await;
    let disconnect = {
        let mut lifecycle = ctx.lifecycle.lock().await;
        let mut sessions = ctx.sessions.lock().await;
        lifecycle.on_disconnected(&mut sessions, &session_key, &client_id)
    };
    debug!("client {client_id} disconnect: {disconnect:?}");
    // The writer closes the socket once the last sender is gone.
    drop(frames_tx);

    if timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!("client {client_id}: writer did not finish in time");
    }
    outcome
}

/// Handshake callback: only the websocket path is upgraded.
#[allow(clippy::result_large_err)]
fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    let path = request.uri().path();
    if path.trim_end_matches('/') == WS_PATH {
        return Ok(response);
    }

    debug!("rejecting upgrade on {path}");
    let mut rejection = ErrorResponse::new(Some(format!("no websocket endpoint at {path}")));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

async fn enqueue(frames: &mpsc::Sender<ServerFrame>, frame: ServerFrame) -> anyhow::Result<()> {
    frames
        .send(frame)
        .await
        .map_err(|_| anyhow!("outbound queue closed"))
}

/// Writes queued frames to the socket until every sender is dropped.
async fn write_frames(
    mut sink: WsSink,
    mut frames: mpsc::Receiver<ServerFrame>,
    client_id: ClientId,
) {
    while let Some(frame) = frames.recv().await {
        let text = match encode_server_frame(&frame) {
            Ok(text) => text,
            Err(e) => {
                error!("client {client_id}: cannot encode {}: {e}", frame.type_name());
                continue;
            }
        };
        if sink.send(WsMessage::Text(text)).await.is_err() {
            debug!("client {client_id}: websocket send failed (peer gone)");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Reads client frames until the session ends.
async fn read_frames(
    ws_rx: &mut WsSource,
    ctx: &ServerContext,
    client_id: &ClientId,
    frames: &mpsc::Sender<ServerFrame>,
) -> anyhow::Result<()> {
    loop {
        let message = match ws_rx.next().await {
            Some(Ok(message)) => message,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("client {client_id}: websocket closed");
                return Ok(());
            }
            Some(Err(e)) => {
                return Err(e).with_context(|| format!("client {client_id}: websocket error"));
            }
            None => {
                debug!("client {client_id}: stream ended");
                return Ok(());
            }
        };

        match message {
            WsMessage::Text(text) => match decode_client_frame(&text) {
                Ok(ClientFrame::Disconnect) => {
                    debug!("client {client_id}: Disconnect frame received");
                    return Ok(());
                }
                Ok(frame) => handle_frame(frame, ctx, client_id, frames).await?,
                Err(e) => {
                    warn!("client {client_id}: invalid frame: {e}");
                    enqueue(
                        frames,
                        ServerFrame::Error {
                            message: format!("invalid frame: {e}"),
                        },
                    )
                    .await?;
                }
            },
            WsMessage::Binary(_) => {
                warn!("client {client_id}: unexpected binary frame");
                enqueue(
                    frames,
                    ServerFrame::Error {
                        message: "binary frames are not supported".to_string(),
                    },
                )
                .await?;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            WsMessage::Close(_) => {
                debug!("client {client_id}: Close frame received");
                return Ok(());
            }
        }
    }
}

async fn handle_frame(
    frame: ClientFrame,
    ctx: &ServerContext,
    client_id: &ClientId,
    frames: &mpsc::Sender<ServerFrame>,
) -> anyhow::Result<()> {
    match frame {
        ClientFrame::Subscribe { destination } => {
            ctx.hub.subscribe(client_id, &destination).await;
            {
                let mut lifecycle = ctx.lifecycle.lock().await;
                let mut sessions = ctx.sessions.lock().await;
                lifecycle.on_subscribed(&mut sessions, client_id);
            }
            debug!("client {client_id} subscribed to {destination}");
            Ok(())
        }
        ClientFrame::Send {
            destination,
            mut body,
        } => {
            if destination != SEND_MESSAGE_DESTINATION {
                warn!("client {client_id}: send to unknown destination {destination}");
                return enqueue(
                    frames,
                    ServerFrame::Error {
                        message: format!("unknown destination: {destination}"),
                    },
                )
                .await;
            }

            body.option = Some(tag_option_with_client(body.option.as_deref(), client_id));
            ctx.sessions.lock().await.touch(client_id);

            let receipt = match ctx.processor.process(body, Some(client_id)).await {
                Ok(reply) => ServerFrame::Receipt {
                    accepted: true,
                    response: reply.response,
                },
                Err(e) => {
                    warn!("client {client_id}: command rejected: {e}");
                    ServerFrame::Receipt {
                        accepted: false,
                        response: e.to_string(),
                    }
                }
            };
            enqueue(frames, receipt).await
        }
        ClientFrame::Disconnect => Ok(()),
    }
}
