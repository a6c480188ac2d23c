//! Authenticated request/response primitive for the engine REST API.
//!
//! [`RequestGateway::request`] is the only place the console talks HTTP. It
//! attaches the session's bearer credential when one is held, classifies the
//! response status into [`ConsoleError`] variants and performs no retries;
//! retry and fallback policy belong to the callers.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::Result;
use crate::error::ConsoleError;
use crate::models::auth::{LoginRequest, TokenResponse};
use crate::models::{EngineCommandAck, EngineStatus, MetricsSnapshot, Order, Trade};
use crate::session::{Credential, SessionStore};

/// Method and optional JSON body of a request.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
        }
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            body: None,
        }
    }

    pub fn put(body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// Configuration objects read and written verbatim through the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSection {
    Runtime,
    /// High-level sliders mapped onto runtime parameters by the engine.
    RuntimeProfile,
    /// Exchange API credentials.
    Exchange,
    /// Alerting bot credentials.
    Telegram,
    /// Which secrets are configured; read-only.
    SecretsStatus,
}

impl ConfigSection {
    pub fn path(&self) -> &'static str {
        match self {
            ConfigSection::Runtime => "/api/config/runtime",
            ConfigSection::RuntimeProfile => "/api/config/runtime/profile",
            ConfigSection::Exchange => "/api/config/exchange",
            ConfigSection::Telegram => "/api/config/telegram",
            ConfigSection::SecretsStatus => "/api/config/secrets/status",
        }
    }

    /// Returns a human-readable label for notices.
    pub fn label(&self) -> &'static str {
        match self {
            ConfigSection::Runtime => "Runtime config",
            ConfigSection::RuntimeProfile => "Runtime profile",
            ConfigSection::Exchange => "Exchange API config",
            ConfigSection::Telegram => "Telegram alert config",
            ConfigSection::SecretsStatus => "Secrets status",
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, ConfigSection::SecretsStatus)
    }

    /// Sections holding credentials may only change while the engine is idle or halted.
    pub fn requires_stopped_engine(&self) -> bool {
        matches!(self, ConfigSection::Exchange | ConfigSection::Telegram)
    }
}

/// Single entry point for authenticated REST calls.
pub struct RequestGateway {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl RequestGateway {
    /// Creates a gateway for `base_url`, optionally trusting a custom CA.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Tls`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        tls_config: Option<rustls::ClientConfig>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(tls_config) = tls_config {
            builder = builder.use_preconfigured_tls(tls_config);
        }
        let client = builder
            .build()
            .map_err(|e| ConsoleError::Tls(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Returns the session store this gateway reads credentials from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Issues one request and returns the decoded JSON body.
    ///
    /// # Errors
    ///
    /// - [`ConsoleError::Auth`] when the server answers 401
    /// - [`ConsoleError::Http`] for any other non-success status
    /// - [`ConsoleError::Transport`] when no response was received
    /// - [`ConsoleError::Decode`] when a success body is not JSON
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(options.method.clone(), &url);

        if let Some(credential) = self.session.credential() {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(method = %options.method, path, status = status.as_u16(), "REST response");

        if !status.is_success() {
            return Err(classify_failure(status, text));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Issues a request and decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// See [`RequestGateway::request`].
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self.request(path, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Exchanges a username and password for a new credential.
    ///
    /// The credential is returned, not stored; the caller decides what to do
    /// with it.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Auth`] when the credentials are wrong, otherwise see
    /// [`RequestGateway::request`].
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let body = serde_json::to_value(LoginRequest { username, password })?;
        let response: TokenResponse = self
            .request_as("/api/auth/login", RequestOptions::post().with_body(body))
            .await?;
        if response.access_token.is_empty() {
            return Err(ConsoleError::Decode(
                "login response carries an empty access_token".to_string(),
            ));
        }
        Ok(Credential::new(response.access_token))
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        self.request_as("/api/status", RequestOptions::get()).await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot> {
        self.request_as("/api/metrics", RequestOptions::get()).await
    }

    pub async fn open_orders(&self) -> Result<Vec<Order>> {
        self.request_as("/api/orders/open", RequestOptions::get())
            .await
    }

    pub async fn recent_trades(&self) -> Result<Vec<Trade>> {
        self.request_as("/api/trades/recent", RequestOptions::get())
            .await
    }

    pub async fn start_engine(&self) -> Result<EngineCommandAck> {
        let value = self
            .request("/api/engine/start", RequestOptions::post())
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub async fn stop_engine(&self) -> Result<EngineCommandAck> {
        let value = self
            .request("/api/engine/stop", RequestOptions::post())
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Reads a configuration object verbatim.
    pub async fn read_config(&self, section: ConfigSection) -> Result<serde_json::Value> {
        self.request(section.path(), RequestOptions::get()).await
    }

    /// Writes a configuration object verbatim and returns the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Rejected`] for read-only sections without
    /// contacting the server.
    pub async fn write_config(
        &self,
        section: ConfigSection,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if !section.is_writable() {
            return Err(ConsoleError::Rejected(format!(
                "{} is read-only",
                section.label()
            )));
        }
        self.request(section.path(), RequestOptions::put(body)).await
    }
}

/// Maps a non-success status onto the error taxonomy.
pub fn classify_failure(status: StatusCode, body: String) -> ConsoleError {
    if status == StatusCode::UNAUTHORIZED {
        ConsoleError::Auth(body)
    } else {
        ConsoleError::Http {
            status: status.as_u16(),
            body,
        }
    }
}
