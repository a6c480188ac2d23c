//! Session-scoped orchestration.
//!
//! [`Console`] owns the [`Merger`] and is the only place updates are applied.
//! While a session is active it runs one poll timer and one push channel
//! client, both tagged with the session epoch they were started under.
//! Updates from any other epoch are discarded, so nothing produced under an
//! old credential can reach the view once the session has changed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::ServerConfig;
use crate::dispatcher::CommandDispatcher;
use crate::event::{Message, Update};
use crate::gateway::RequestGateway;
use crate::merger::{ERROR_SESSION_EXPIRED, Merger, ViewModel};
use crate::poller::{PollerHandle, SnapshotPoller};
use crate::session::SessionStore;
use crate::stream::{ConnectionState, StreamClient, StreamHandle};

/// Producers running for the active session.
struct Channels {
    epoch: u64,
    poller: PollerHandle,
    stream: StreamHandle,
}

pub struct Console {
    session: Arc<SessionStore>,
    gateway: Arc<RequestGateway>,
    stream_url: String,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    poll_interval: Duration,
    merger: Merger,
    tx: mpsc::UnboundedSender<Message>,
    channels: Option<Channels>,
}

impl Console {
    /// Creates a console with no running channels.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Tls`] if the HTTP client cannot be built.
    pub fn new(
        server: &ServerConfig,
        session: Arc<SessionStore>,
        tls_config: Option<rustls::ClientConfig>,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Result<Self> {
        let gateway = RequestGateway::new(&server.base_url, session.clone(), tls_config.clone())?;
        Ok(Self {
            session,
            gateway: Arc::new(gateway),
            stream_url: server.stream_url.clone(),
            tls_config: tls_config.map(Arc::new),
            poll_interval: server.poll_interval,
            merger: Merger::new(),
            tx,
            channels: None,
        })
    }

    pub fn view(&self) -> &ViewModel {
        self.merger.view()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Epoch of the running channels, if a session is active.
    pub fn active_epoch(&self) -> Option<u64> {
        self.channels.as_ref().map(|c| c.epoch)
    }

    /// Starts channels from a credential persisted by a previous run.
    ///
    /// Returns `false` when there is nothing to resume.
    pub fn resume(&mut self) -> bool {
        if !self.session.is_authenticated() {
            return false;
        }
        info!("Resuming stored session");
        self.start_channels(self.session.epoch());
        true
    }

    /// Exchanges a username and password for a new session and starts it.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure. The previous session, if any, is left
    /// running.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let credential = match self.gateway.login(username, password).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.merger.set_error(e.to_string());
                return Err(e);
            }
        };

        self.stop_channels();
        let epoch = self.session.set_credential(credential);
        self.merger.clear_error();
        info!(epoch, username, "Logged in");
        self.start_channels(epoch);
        Ok(())
    }

    /// Ends the session and forgets everything shown.
    pub fn logout(&mut self) {
        self.session.clear();
        self.stop_channels();
        self.merger.reset();
        info!("Logged out");
    }

    /// A dispatcher bound to the active session, if there is one.
    pub fn dispatcher(&self) -> Option<CommandDispatcher> {
        self.channels
            .as_ref()
            .map(|c| CommandDispatcher::new(self.gateway.clone(), c.epoch, self.tx.clone()))
    }

    /// Applies one message from the event loop. Terminal input is ignored.
    pub fn handle(&mut self, message: Message) {
        if let Message::Update { epoch, update } = message {
            self.apply(epoch, update);
        }
    }

    /// Applies an update produced under `epoch`.
    pub fn apply(&mut self, epoch: u64, update: Update) {
        if self.active_epoch() != Some(epoch) {
            debug!(epoch, active = ?self.active_epoch(), "Discarding update from an ended session");
            return;
        }

        match update {
            Update::Snapshot(snapshot) => self.merger.apply_snapshot(snapshot),
            Update::Stream(message) => self.merger.apply_stream(message),
            Update::Connection(state) => self.merger.set_connection_state(state),
            Update::SessionExpired => self.expire_session(),
            Update::Notice(text) => self.merger.set_notice(text),
            Update::Failed(e) if e.is_auth() => {
                warn!(error = %e, "Request rejected the credential");
                self.expire_session();
            }
            Update::Failed(e) => self.merger.set_error(e.to_string()),
            Update::ErrorCleared => self.merger.clear_error(),
        }
    }

    /// Drops the credential, tears the channels down and raises the
    /// expiry error. Data already shown is kept.
    fn expire_session(&mut self) {
        self.session.clear();
        self.stop_channels();
        self.merger.set_error(ERROR_SESSION_EXPIRED);
        warn!("Session expired");
    }

    fn start_channels(&mut self, epoch: u64) {
        self.stop_channels();

        let poller =
            SnapshotPoller::new(self.gateway.clone()).spawn(self.poll_interval, epoch, self.tx.clone());
        let stream = StreamClient::new(
            self.stream_url.clone(),
            self.session.clone(),
            self.tls_config.clone(),
            epoch,
            self.tx.clone(),
        )
        .spawn();

        debug!(epoch, "Channels started");
        self.channels = Some(Channels {
            epoch,
            poller,
            stream,
        });
    }

    fn stop_channels(&mut self) {
        let Some(channels) = self.channels.take() else {
            return;
        };
        channels.stream.stop();
        channels.poller.stop();
        self.merger.set_connection_state(ConnectionState::Disconnected);
        debug!(epoch = channels.epoch, "Channels stopped");
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("stream_url", &self.stream_url)
            .field("poll_interval", &self.poll_interval)
            .field("active_epoch", &self.active_epoch())
            .finish_non_exhaustive()
    }
}
