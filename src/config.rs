//! Application configuration loaded from environment variables.
//!
//! Every variable is optional:
//! - `MMCONSOLE_BASE_URL`: REST base URL of the engine backend
//! - `MMCONSOLE_STREAM_URL`: push channel URL, derived from the base URL when unset
//! - `MMCONSOLE_POLL_INTERVAL_MS`: snapshot poll period in milliseconds
//! - `MMCONSOLE_CA_CERT`: PEM file with additional CA roots
//! - `MMCONSOLE_SESSION_STORE`: `file`, `keyring` or `memory`
//! - `MMCONSOLE_SESSION_FILE`: credential file used by the `file` store
//! - `MMCONSOLE_USERNAME` / `MMCONSOLE_PASSWORD`: login credentials (both or neither)
//! - `MMCONSOLE_LOG_FILE`: tracing output file

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

/// Default REST endpoint of a locally running engine.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Push channel path appended to the base URL.
const STREAM_PATH: &str = "/ws/stream";

/// Default snapshot poll period.
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

const DEFAULT_LOG_FILE: &str = "mmconsole.log";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionStorage,
    pub login: Option<LoginConfig>,
    pub log_file: PathBuf,
}

/// Where the engine backend lives and how often it is polled.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub stream_url: String,
    pub poll_interval: Duration,
    pub ca_cert: Option<PathBuf>,
}

/// Durable storage used for the session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStorage {
    /// System keychain.
    Keyring,
    /// Plain file readable only by the current user.
    File(PathBuf),
    /// Not persisted across restarts.
    Memory,
}

/// Username and password used when no stored session exists.
pub struct LoginConfig {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`ConsoleError::Config`](crate::ConsoleError::Config) if a value
/// cannot be parsed, the base URL scheme is not `http`/`https`, or only one
/// of the two login variables is set.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let base_url =
        non_empty_var("MMCONSOLE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let stream_url = match non_empty_var("MMCONSOLE_STREAM_URL") {
        Some(url) => url,
        None => derive_stream_url(&base_url)?,
    };

    let poll_interval = match non_empty_var("MMCONSOLE_POLL_INTERVAL_MS") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                return Err(crate::ConsoleError::Config(format!(
                    "MMCONSOLE_POLL_INTERVAL_MS must be a positive integer, got {raw:?}"
                )));
            }
        },
        None => Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
    };

    let session = match non_empty_var("MMCONSOLE_SESSION_STORE").as_deref() {
        None | Some("file") => SessionStorage::File(session_file()),
        Some("keyring") => SessionStorage::Keyring,
        Some("memory") => SessionStorage::Memory,
        Some(other) => {
            return Err(crate::ConsoleError::Config(format!(
                "MMCONSOLE_SESSION_STORE must be one of file, keyring, memory; got {other:?}"
            )));
        }
    };

    let username = non_empty_var("MMCONSOLE_USERNAME");
    let password = non_empty_var("MMCONSOLE_PASSWORD");
    let login = match (username, password) {
        (Some(username), Some(password)) => Some(LoginConfig {
            username,
            password: Zeroizing::new(password),
        }),
        (Some(_), None) => {
            return Err(crate::ConsoleError::Config(
                "MMCONSOLE_USERNAME is set but MMCONSOLE_PASSWORD is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(crate::ConsoleError::Config(
                "MMCONSOLE_PASSWORD is set but MMCONSOLE_USERNAME is missing".to_string(),
            ));
        }
        (None, None) => None,
    };

    Ok(AppConfig {
        server: ServerConfig {
            base_url,
            stream_url,
            poll_interval,
            ca_cert: non_empty_var("MMCONSOLE_CA_CERT").map(PathBuf::from),
        },
        session,
        login,
        log_file: non_empty_var("MMCONSOLE_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
    })
}

/// Maps a REST base URL onto the push channel URL on the same host.
///
/// # Errors
///
/// Returns [`ConsoleError::Config`](crate::ConsoleError::Config) for schemes
/// other than `http` and `https`.
pub fn derive_stream_url(base_url: &str) -> crate::Result<String> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(crate::ConsoleError::Config(format!(
            "MMCONSOLE_BASE_URL must start with http:// or https://, got {base_url:?}"
        )));
    };
    Ok(format!("{ws_base}{STREAM_PATH}"))
}

/// Default credential file under the user's home directory.
fn session_file() -> PathBuf {
    if let Some(path) = non_empty_var("MMCONSOLE_SESSION_FILE") {
        return PathBuf::from(path);
    }
    let home = non_empty_var("HOME").unwrap_or_else(|| ".".to_string());
    PathBuf::from(home).join(".mmconsole").join("session")
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
