//! Shared test utilities: an in-process REST responder and push channel server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tungstenite::Message as WsMessage;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use mmconsole::config::ServerConfig;

pub const STATUS_JSON: &str = include_str!("../fixtures/status.json");
pub const METRICS_JSON: &str = include_str!("../fixtures/metrics.json");
pub const ORDERS_JSON: &str = include_str!("../fixtures/orders.json");
pub const TRADES_JSON: &str = include_str!("../fixtures/trades.json");
pub const TICK_JSON: &str = include_str!("../fixtures/tick.json");

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// One request as seen by [`MockHttp`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

/// Minimal HTTP/1.1 responder with canned per-route replies.
///
/// Unknown routes answer 404. Every response closes the connection.
pub struct MockHttp {
    pub base_url: String,
    routes: Routes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttp {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::default();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();

        let (r, q) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_http(socket, r.clone(), q.clone()));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            routes,
            requests,
        }
    }

    /// Starts a responder that already serves a healthy snapshot and login.
    pub async fn with_snapshot() -> Self {
        let mock = Self::start().await;
        mock.serve_snapshot();
        mock.route("POST", "/api/auth/login", 200, r#"{"access_token":"tok-1","token_type":"bearer"}"#);
        mock
    }

    pub fn route(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{method} {path}"), (status, body.to_string()));
    }

    pub fn serve_snapshot(&self) {
        self.route("GET", "/api/status", 200, STATUS_JSON);
        self.route("GET", "/api/metrics", 200, METRICS_JSON);
        self.route("GET", "/api/orders/open", 200, ORDERS_JSON);
        self.route("GET", "/api/trades/recent", 200, TRADES_JSON);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

async fn serve_http(mut socket: TcpStream, routes: Routes, requests: Arc<Mutex<Vec<RecordedRequest>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "authorization" => authorization = Some(value.to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < head_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = buf.len().min(head_end + content_length);
    let body = String::from_utf8_lossy(&buf[head_end..body_end]).to_string();

    let reply = routes
        .lock()
        .unwrap()
        .get(&format!("{method} {path}"))
        .cloned()
        .unwrap_or((404, r#"{"detail":"Not Found"}"#.to_string()));

    requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        authorization,
        body,
    });

    let (status, body) = reply;
    let response = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// What the push channel server sends next.
#[derive(Debug)]
pub enum ServerFrame {
    Text(String),
    Close(u16),
}

/// In-process push channel server.
///
/// Frames queued with [`MockStream::send`] go to whichever connection is
/// currently open.
pub struct MockStream {
    pub url: String,
    frames: mpsc::UnboundedSender<ServerFrame>,
    connections: Arc<AtomicUsize>,
    tokens: Arc<Mutex<Vec<String>>>,
    reject_handshake: Arc<AtomicBool>,
}

impl MockStream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let connections = Arc::new(AtomicUsize::new(0));
        let tokens: Arc<Mutex<Vec<String>>> = Arc::default();
        let reject_handshake = Arc::new(AtomicBool::new(false));

        let (c, t, r) = (connections.clone(), tokens.clone(), reject_handshake.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (c, t, r, rx) = (c.clone(), t.clone(), r.clone(), rx.clone());
                tokio::spawn(async move {
                    let callback = |request: &Request, response: Response| {
                        let query = request.uri().query().unwrap_or_default().to_string();
                        t.lock().unwrap().push(query);
                        if r.load(Ordering::SeqCst) {
                            let refused: ErrorResponse = tungstenite::http::Response::builder()
                                .status(401)
                                .body(None)
                                .unwrap();
                            return Err(refused);
                        }
                        Ok(response)
                    };
                    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await
                    else {
                        return;
                    };
                    c.fetch_add(1, Ordering::SeqCst);

                    loop {
                        tokio::select! {
                            frame = async { rx.lock().await.recv().await } => match frame {
                                Some(ServerFrame::Text(text)) => {
                                    if ws.send(WsMessage::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(ServerFrame::Close(code)) => {
                                    let frame = CloseFrame {
                                        code: CloseCode::from(code),
                                        reason: "".into(),
                                    };
                                    let _ = ws.close(Some(frame)).await;
                                    break;
                                }
                                None => break,
                            },
                            incoming = ws.next() => match incoming {
                                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}/ws/stream"),
            frames,
            connections,
            tokens,
            reject_handshake,
        }
    }

    pub fn send(&self, frame: ServerFrame) {
        self.frames.send(frame).unwrap();
    }

    pub fn send_text(&self, text: &str) {
        self.send(ServerFrame::Text(text.to_string()));
    }

    /// Refuses subsequent handshakes with HTTP 401.
    pub fn reject_handshakes(&self) {
        self.reject_handshake.store(true, Ordering::SeqCst);
    }

    /// Number of accepted connections so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Query strings of every handshake attempt.
    pub fn handshake_queries(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

/// Server settings pointing at the mocks.
pub fn server_config(http: &MockHttp, stream_url: &str, poll_interval: Duration) -> ServerConfig {
    ServerConfig {
        base_url: http.base_url.clone(),
        stream_url: stream_url.to_string(),
        poll_interval,
        ca_cert: None,
    }
}

/// A URL nothing listens on.
pub async fn dead_url(scheme: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("{scheme}://{addr}")
}

/// Polls `check` every 10ms until it holds or [`WAIT`] elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
