//! Plain HTTP endpoint served on the websocket port.
//!
//! `POST /api/messages/send` broadcasts the raw request body to every bot
//! user and answers with a short text status:
//!
//! | Outcome                         | Status |
//! |---------------------------------|--------|
//! | At least one user received it   | 200    |
//! | Nobody received it, blank body  | 400    |
//! | Broadcast task failed           | 500    |
//!
//! Websocket upgrades always start with `GET`, so the accept loop peeks at
//! the first bytes of a connection to pick the handler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::domain::ports::NotificationService;

/// Path of the broadcast endpoint.
pub const SEND_MESSAGE_PATH: &str = "/api/messages/send";

/// Upper bound on head plus body of one request.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const MAX_HEADERS: usize = 32;
const READ_CHUNK: usize = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const METHOD_PEEK_TIMEOUT: Duration = Duration::from_secs(5);
const METHOD_PEEK_RETRY: Duration = Duration::from_millis(10);

/// Why a request could not be read.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed HTTP request: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("request exceeds {0} bytes")]
    TooLarge(usize),

    #[error("invalid Content-Length header")]
    InvalidLength,

    #[error("connection closed before the request was complete")]
    Incomplete,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Whether the connection opens with something other than a `GET` request.
///
/// Waits until four bytes are readable; a connection that closes or stays
/// silent is left to the websocket handshake.
pub async fn is_plain_http(stream: &TcpStream) -> bool {
    let mut method = [0u8; 4];
    let peeked = timeout(METHOD_PEEK_TIMEOUT, async {
        loop {
            match stream.peek(&mut method).await {
                Ok(n) if n >= method.len() => return true,
                Ok(0) | Err(_) => return false,
                Ok(_) => sleep(METHOD_PEEK_RETRY).await,
            }
        }
    })
    .await;
    matches!(peeked, Ok(true)) && &method != b"GET "
}

/// Reads one request, answers it, and closes the connection.
pub async fn serve_http(
    mut stream: TcpStream,
    notifications: Arc<dyn NotificationService>,
) -> anyhow::Result<()> {
    let response = match timeout(REQUEST_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(request)) => route(request, notifications).await,
        Ok(Err(e)) => {
            warn!("rejecting HTTP request: {e}");
            HttpResponse::new(e.status(), e.to_string())
        }
        Err(_) => HttpResponse::new(StatusCode::REQUEST_TIMEOUT, "request timed out"),
    };
    write_response(&mut stream, &response)
        .await
        .context("failed to write HTTP response")
}

/// Dispatches a parsed request.
pub async fn route(
    request: HttpRequest,
    notifications: Arc<dyn NotificationService>,
) -> HttpResponse {
    let path = request.path.split('?').next().unwrap_or_default();
    if path != SEND_MESSAGE_PATH {
        return HttpResponse::new(StatusCode::NOT_FOUND, format!("no endpoint at {path}"));
    }
    if request.method != "POST" {
        return HttpResponse::new(StatusCode::METHOD_NOT_ALLOWED, "use POST");
    }

    let message = match String::from_utf8(request.body) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => return HttpResponse::new(StatusCode::BAD_REQUEST, "message body is empty"),
        Err(_) => {
            return HttpResponse::new(StatusCode::BAD_REQUEST, "message body is not valid UTF-8")
        }
    };

    info!("broadcast requested over HTTP ({} bytes)", message.len());
    let broadcast = tokio::spawn(async move { notifications.broadcast(&message).await }).await;
    match broadcast {
        Ok(0) => HttpResponse::new(
            StatusCode::BAD_REQUEST,
            "Message was not delivered to any user",
        ),
        Ok(recipients) => HttpResponse::new(
            StatusCode::OK,
            format!("Message sent to {recipients} users"),
        ),
        Err(e) => {
            error!("HTTP broadcast failed: {e}");
            HttpResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to send the message: {e}"),
            )
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<HttpRequest, HttpError> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::Incomplete);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(HttpError::TooLarge(MAX_REQUEST_BYTES));
        }
        if let Some(request) = parse_request(&buf)? {
            debug!("{} {} ({} byte body)", request.method, request.path, request.body.len());
            return Ok(request);
        }
    }
}

/// Parses a complete request from `buf`; `None` while bytes are missing.
fn parse_request(buf: &[u8]) -> Result<Option<HttpRequest>, HttpError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    let head_len = match request.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let content_length = match request
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        Some(header) => std::str::from_utf8(header.value)
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .ok_or(HttpError::InvalidLength)?,
        None => 0,
    };
    if content_length > MAX_REQUEST_BYTES {
        return Err(HttpError::TooLarge(MAX_REQUEST_BYTES));
    }

    let end = head_len + content_length;
    if buf.len() < end {
        return Ok(None);
    }
    Ok(Some(HttpRequest {
        method: request.method.unwrap_or_default().to_string(),
        path: request.path.unwrap_or_default().to_string(),
        body: buf[head_len..end].to_vec(),
    }))
}

async fn write_response(stream: &mut TcpStream, response: &HttpResponse) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or_default(),
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clipbridge_core::ClientId;
    use std::sync::Mutex;

    /// Counts broadcasts and reports a fixed number of recipients.
    #[derive(Default)]
    struct FixedRecipients {
        recipients: usize,
        broadcasts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationService for FixedRecipients {
        async fn notify_client_message(
            &self,
            _user_id: i64,
            _client_id: &ClientId,
            _message: &str,
        ) -> bool {
            true
        }

        async fn broadcast(&self, message: &str) -> usize {
            self.broadcasts.lock().unwrap().push(message.to_string());
            self.recipients
        }
    }

    fn post(body: &str) -> HttpRequest {
        HttpRequest {
            method: "POST".to_string(),
            path: SEND_MESSAGE_PATH.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_parse_request_waits_for_full_body() {
        // Arrange
        let head = "POST /api/messages/send HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\n";

        // Act
        let partial = parse_request(format!("{head}he").as_bytes()).unwrap();
        let complete = parse_request(format!("{head}hello").as_bytes()).unwrap();

        // Assert
        assert_eq!(partial, None);
        assert_eq!(complete, Some(post("hello")));
    }

    #[test]
    fn test_parse_request_without_body() {
        let request = parse_request(b"GET /api/messages/send HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_parse_request_rejects_bad_content_length() {
        let result = parse_request(b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n");
        assert!(matches!(result, Err(HttpError::InvalidLength)));
    }

    #[test]
    fn test_parse_request_rejects_oversized_body() {
        let head = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_BYTES + 1
        );
        let result = parse_request(head.as_bytes());
        assert!(matches!(result, Err(HttpError::TooLarge(_))));
    }

    #[tokio::test]
    async fn test_route_broadcasts_body_and_reports_recipients() {
        // Arrange
        let notifications = Arc::new(FixedRecipients {
            recipients: 3,
            ..FixedRecipients::default()
        });

        // Act
        let response = route(post("server going down"), notifications.clone()).await;

        // Assert
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "Message sent to 3 users");
        assert_eq!(
            notifications.broadcasts.lock().unwrap().as_slice(),
            &["server going down".to_string()]
        );
    }

    #[tokio::test]
    async fn test_route_without_recipients_is_bad_request() {
        let response = route(post("hello"), Arc::new(FixedRecipients::default())).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_route_rejects_blank_body_without_broadcasting() {
        // Arrange
        let notifications = Arc::new(FixedRecipients {
            recipients: 1,
            ..FixedRecipients::default()
        });

        // Act
        let response = route(post("   "), notifications.clone()).await;

        // Assert
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(notifications.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_route_unknown_path_and_wrong_method() {
        // Arrange
        let notifications: Arc<dyn NotificationService> = Arc::new(FixedRecipients::default());
        let elsewhere = HttpRequest {
            path: "/api/other".to_string(),
            ..post("x")
        };
        let put = HttpRequest {
            method: "PUT".to_string(),
            ..post("x")
        };

        // Act
        let not_found = route(elsewhere, Arc::clone(&notifications)).await;
        let not_allowed = route(put, notifications).await;

        // Assert
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_allowed.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_route_ignores_query_string() {
        let request = HttpRequest {
            path: format!("{SEND_MESSAGE_PATH}?source=cron"),
            ..post("hi")
        };
        let response = route(
            request,
            Arc::new(FixedRecipients {
                recipients: 1,
                ..FixedRecipients::default()
            }),
        )
        .await;
        assert_eq!(response.status, StatusCode::OK);
    }
}
