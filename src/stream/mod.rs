//! Push channel client.
//!
//! This module is organized by concern:
//! - [`state`] - Connection state machine and reconnect backoff
//! - [`handler`] - Decoding of incoming frames
//! - [`connection`] - The async client that drives the state machine

mod connection;
mod handler;
mod state;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::info;

use crate::error::ConsoleError;
use crate::session::Credential;

pub use connection::{StreamClient, StreamHandle};
pub use handler::decode_frame;
pub use state::{
    AUTH_REJECT_CLOSE_CODE, Action, ConnectionEvent, ConnectionState, StreamMachine,
    reconnect_delay,
};

/// Write half of a push channel connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Message>;

/// Read half of a push channel connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Why a connection could not be opened.
#[derive(Debug)]
pub enum OpenError {
    /// The server refused the handshake because of the credential.
    AuthRejected(u16),
    /// Any other failure; worth retrying.
    Failed(ConsoleError),
}

/// Appends the credential as the `token` query parameter.
pub fn stream_url_with_token(url: &str, credential: &Credential) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}token={}", credential.expose())
}

/// Opens a push channel connection authenticated with `credential`.
///
/// # Errors
///
/// Returns [`OpenError::AuthRejected`] when the handshake is refused with
/// HTTP 401 or 403, and [`OpenError::Failed`] for every other failure.
pub async fn connect(
    url: &str,
    credential: &Credential,
    tls_config: Option<Arc<rustls::ClientConfig>>,
) -> std::result::Result<(WsWriter, WsReader), OpenError> {
    let request = stream_url_with_token(url, credential);
    let connector = tls_config.map(Connector::Rustls);

    match tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector).await {
        Ok((ws_stream, _)) => {
            info!("WebSocket handshake completed");
            Ok(ws_stream.split())
        }
        Err(tungstenite::Error::Http(response)) => {
            let status = response.status().as_u16();
            if status == 401 || status == 403 {
                Err(OpenError::AuthRejected(status))
            } else {
                Err(OpenError::Failed(ConsoleError::Transport(format!(
                    "handshake refused with HTTP {status}"
                ))))
            }
        }
        Err(e) => Err(OpenError::Failed(e.into())),
    }
}
