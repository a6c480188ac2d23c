//! Operator commands.
//!
//! [`CommandDispatcher`] sends start/stop/reconfigure requests through the
//! gateway and then pulls one snapshot so the view shows what the engine
//! actually did. Command responses carry no state of their own.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::Result;
use crate::error::ConsoleError;
use crate::event::{Message, Update};
use crate::gateway::{ConfigSection, RequestGateway};
use crate::merger::{NOTICE_STARTED, NOTICE_STOPPING};
use crate::models::EngineMode;
use crate::poller::SnapshotPoller;

/// Issues engine commands for one session epoch.
#[derive(Clone)]
pub struct CommandDispatcher {
    gateway: Arc<RequestGateway>,
    poller: SnapshotPoller,
    epoch: u64,
    tx: mpsc::UnboundedSender<Message>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(
        gateway: Arc<RequestGateway>,
        epoch: u64,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let poller = SnapshotPoller::new(gateway.clone());
        Self {
            gateway,
            poller,
            epoch,
            tx,
        }
    }

    /// Starts the engine, then reconciles with a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns the command failure; it has also been reported to the console.
    pub async fn start(&self) -> Result<()> {
        self.emit(Update::ErrorCleared);
        let result = self.gateway.start_engine().await;
        self.refresh().await;

        let ack = self.settle(result)?;
        info!(mode = ?ack.mode, "Engine start accepted");
        self.emit(Update::Notice(NOTICE_STARTED.to_string()));
        Ok(())
    }

    /// Stops the engine, then reconciles with a fresh snapshot.
    ///
    /// The "stopping" notice is raised before the request is sent. Success
    /// only means the engine accepted the stop; completion of the position
    /// unwind is reported later by `close_done` or seen in a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the command failure; it has also been reported to the console.
    pub async fn stop(&self) -> Result<()> {
        self.emit(Update::Notice(NOTICE_STOPPING.to_string()));
        self.emit(Update::ErrorCleared);
        let result = self.gateway.stop_engine().await;
        self.refresh().await;

        let ack = self.settle(result)?;
        info!(mode = ?ack.mode, "Engine stop accepted");
        Ok(())
    }

    /// Writes a configuration object, then reconciles with a fresh snapshot.
    ///
    /// Credential-bearing sections are only writable while the engine is
    /// idle or halted, judged by `current_mode`.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Rejected`] when refused locally, otherwise the gateway
    /// failure. Either way it has also been reported to the console.
    pub async fn reconfigure(
        &self,
        section: ConfigSection,
        body: serde_json::Value,
        current_mode: Option<EngineMode>,
    ) -> Result<serde_json::Value> {
        if section.requires_stopped_engine()
            && !current_mode.is_some_and(|mode| mode.allows_credential_edits())
        {
            let err = ConsoleError::Rejected(format!(
                "{} can only be changed while the engine is idle or halted",
                section.label()
            ));
            self.emit(Update::Failed(err.clone()));
            return Err(err);
        }

        self.emit(Update::ErrorCleared);
        let result = self.gateway.write_config(section, body).await;
        self.refresh().await;

        let stored = self.settle(result)?;
        self.emit(Update::Notice(format!("{} saved", section.label())));
        Ok(stored)
    }

    /// Pulls one snapshot outside the poll schedule and hands it to the console.
    pub async fn refresh(&self) {
        let update = match self.poller.refresh().await {
            Ok(snapshot) => Update::Snapshot(snapshot),
            Err(e) => {
                warn!(error = %e, "Reconciling snapshot failed");
                Update::Failed(e)
            }
        };
        self.emit(update);
    }

    /// Reports a failed command to the console and passes the result through.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(epoch = self.epoch, error = %e, "Command failed");
            self.emit(Update::Failed(e.clone()));
        }
        result
    }

    fn emit(&self, update: Update) {
        let _ = self.tx.send(Message::update(self.epoch, update));
    }
}
