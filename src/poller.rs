//! Periodic full-state pulls.
//!
//! [`SnapshotPoller::refresh`] fetches status, metrics, open orders and
//! recent trades concurrently and succeeds only if all four do, so the
//! console never applies a half-updated view. [`SnapshotPoller::spawn`]
//! repeats that on a fixed interval; failures are reported and the timer
//! keeps going.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::Result;
use crate::event::{Message, Update};
use crate::gateway::RequestGateway;
use crate::models::Snapshot;

/// Pulls full snapshots through the gateway.
#[derive(Clone)]
pub struct SnapshotPoller {
    gateway: Arc<RequestGateway>,
}

impl SnapshotPoller {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// Fetches all four snapshot fields concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the four requests; no partial
    /// snapshot is ever returned.
    pub async fn refresh(&self) -> Result<Snapshot> {
        let (status, metrics, orders, trades) = tokio::try_join!(
            self.gateway.status(),
            self.gateway.metrics(),
            self.gateway.open_orders(),
            self.gateway.recent_trades(),
        )?;
        Ok(Snapshot {
            status,
            metrics,
            orders,
            trades,
        })
    }

    /// Polls every `interval`, starting immediately, tagging results with `epoch`.
    ///
    /// The task ends when the returned handle is dropped or the receiving
    /// side of `tx` goes away.
    pub fn spawn(
        self,
        interval: Duration,
        epoch: u64,
        tx: mpsc::UnboundedSender<Message>,
    ) -> PollerHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let update = match self.refresh().await {
                    Ok(snapshot) => {
                        debug!(epoch, "Snapshot refreshed");
                        Update::Snapshot(snapshot)
                    }
                    Err(e) => {
                        warn!(epoch, error = %e, "Snapshot poll failed");
                        Update::Failed(e)
                    }
                };
                if tx.send(Message::update(epoch, update)).is_err() {
                    break;
                }
            }
        });
        PollerHandle { task }
    }
}

/// Running poll timer. Dropping the handle cancels it.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancels the timer and any poll in flight.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
