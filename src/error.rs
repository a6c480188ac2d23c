//! Crate-level error types.
//!
//! [`ConsoleError`] unifies every error source (REST, push channel, JSON,
//! configuration, credential storage) behind a single enum. The first four
//! variants mirror the failure taxonomy the console reacts to: auth failures
//! are terminal for the session, HTTP failures are surfaced and the channel
//! carries on, transport failures are retried and decode failures on the push
//! channel are dropped.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    /// The server rejected the credential (HTTP 401).
    #[error("{}", http_detail(&401, .0))]
    Auth(String),

    /// Any other non-success HTTP status.
    #[error("{}", http_detail(.status, .body))]
    Http { status: u16, body: String },

    /// The request or connection could not be completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration could not be loaded from the environment.
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS setup failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// Terminal or file I/O failed.
    #[error("io error: {0}")]
    Io(String),

    /// Reading or writing the persisted credential failed.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// A command was refused before reaching the server.
    #[error("{0}")]
    Rejected(String),
}

impl ConsoleError {
    /// Returns `true` for failures that invalidate the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, ConsoleError::Auth(_))
    }
}

/// Body text of a failed response, or `HTTP <status>` when the body is empty.
fn http_detail(status: &u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ConsoleError::Decode(e.to_string())
        } else {
            ConsoleError::Transport(e.to_string())
        }
    }
}

impl From<tungstenite::Error> for ConsoleError {
    fn from(e: tungstenite::Error) -> Self {
        ConsoleError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Io(e.to_string())
    }
}
