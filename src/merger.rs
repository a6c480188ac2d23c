//! Client-side view model and its single writer.
//!
//! [`ViewModel`] is the one structure the presentation layer reads. It has no
//! public mutators: every change goes through [`Merger`], which applies full
//! snapshots and incremental push updates under one precedence rule. A
//! snapshot replaces status, metrics, orders and trades wholesale; a tick
//! replaces only the metrics summary (and the open orders when it carries
//! them) and is dropped if no snapshot has established metrics yet.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::{
    EngineStatus, MetricsSnapshot, Order, Snapshot, StreamMessage, TickPayload, Trade,
};
use crate::stream::ConnectionState;

/// Shown when the engine accepted a start command.
pub const NOTICE_STARTED: &str = "Engine started";

/// Shown as soon as a stop is requested, before the engine confirms anything.
pub const NOTICE_STOPPING: &str = "Engine stopping: cancelling orders and unwinding positions...";

/// Shown when the engine retries the taker close of the remaining position.
pub const NOTICE_CLOSE_RETRY: &str = "Engine stopping: retrying taker close of the remaining position";

/// Shown when the engine reports the position is flat.
pub const NOTICE_STOPPED: &str = "Engine stopped: positions closed";

/// Raised once when the server invalidates the session.
pub const ERROR_SESSION_EXPIRED: &str = "Session expired, please log in again";

/// A message with the instant it was raised.
#[derive(Clone, Debug, PartialEq)]
pub struct Banner {
    pub message: String,
    pub raised_at: Instant,
}

impl Banner {
    fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raised_at: Instant::now(),
        }
    }
}

/// Everything the console shows about the engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewModel {
    status: Option<EngineStatus>,
    metrics: Option<MetricsSnapshot>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    connection_state: ConnectionState,
    last_error: Option<Banner>,
    last_notice: Option<Banner>,
    refreshed_at: Option<Instant>,
}

impl ViewModel {
    pub fn status(&self) -> Option<&EngineStatus> {
        self.status.as_ref()
    }

    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn last_error(&self) -> Option<&Banner> {
        self.last_error.as_ref()
    }

    pub fn last_notice(&self) -> Option<&Banner> {
        self.last_notice.as_ref()
    }

    /// Instant the last snapshot was applied. Ticks do not move it.
    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    /// Age of the last snapshot at `now`, or `None` before the first one.
    pub fn snapshot_age(&self, now: Instant) -> Option<Duration> {
        self.refreshed_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Whether a snapshot newer than `max_age` has been applied.
    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        self.snapshot_age(now).is_some_and(|age| age <= max_age)
    }
}

/// Sole mutator of the [`ViewModel`].
#[derive(Debug, Default)]
pub struct Merger {
    view: ViewModel,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access for everyone else.
    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    /// Replaces status, metrics, orders and trades with a consistent snapshot.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let Snapshot {
            status,
            metrics,
            orders,
            trades,
        } = snapshot;
        self.view.status = Some(status);
        self.view.metrics = Some(metrics);
        self.view.orders = orders;
        self.view.trades = trades;
        self.view.refreshed_at = Some(Instant::now());
    }

    /// Refines the last snapshot with a push update.
    ///
    /// Returns `false` when the tick was dropped because no metrics exist yet.
    pub fn apply_tick(&mut self, tick: TickPayload) -> bool {
        let Some(metrics) = self.view.metrics.as_mut() else {
            debug!("dropping tick received before the first snapshot");
            return false;
        };
        metrics.summary = tick.summary;
        if let Some(open_orders) = tick.open_orders {
            self.view.orders = open_orders;
        }
        true
    }

    /// Routes a decoded push message: ticks merge, close events raise notices.
    pub fn apply_stream(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Tick(tick) => {
                self.apply_tick(tick);
            }
            StreamMessage::CloseRetry { attempt, .. } => {
                let notice = match attempt {
                    Some(attempt) => format!("{NOTICE_CLOSE_RETRY} (attempt {attempt})"),
                    None => NOTICE_CLOSE_RETRY.to_string(),
                };
                self.set_notice(notice);
            }
            StreamMessage::CloseDone { .. } => self.set_notice(NOTICE_STOPPED),
            StreamMessage::Unrecognized(kind) => {
                debug!(kind = %kind, "ignoring push message");
            }
        }
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.view.connection_state = state;
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.view.last_notice = Some(Banner::now(message));
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.view.last_error = Some(Banner::now(message));
    }

    pub fn clear_error(&mut self) {
        self.view.last_error = None;
    }

    /// Forgets all engine data, e.g. after logging out.
    pub fn reset(&mut self) {
        self.view = ViewModel::default();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::models::{EngineMode, SeriesPoint, Side, Summary};

    fn summary(pairs: &[(&str, f64)]) -> Summary {
        Summary(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect(),
        )
    }

    fn order(id: &str) -> Order {
        Order {
            order_id: id.to_string(),
            side: Side::Sell,
            price: dec!(101.5),
            size: dec!(0.2),
            status: "open".to_string(),
            created_at: None,
        }
    }

    fn trade(id: &str) -> Trade {
        Trade {
            trade_id: id.to_string(),
            side: Side::Buy,
            price: dec!(100.0),
            size: dec!(0.1),
            fee: dec!(0.001),
            fee_side: Some("maker".to_string()),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn snapshot() -> Snapshot {
        let mut series = BTreeMap::new();
        series.insert(
            "sigma".to_string(),
            vec![
                SeriesPoint {
                    timestamp: "2025-01-01T00:00:00Z".to_string(),
                    value: 0.01,
                },
                SeriesPoint {
                    timestamp: "2025-01-01T00:00:03Z".to_string(),
                    value: 0.02,
                },
            ],
        );
        Snapshot {
            status: EngineStatus {
                mode: EngineMode::Running,
                symbol: "BNB_USDT_Perp".to_string(),
                engine_running: Some(true),
                exchange_connected: Some(true),
                kill_reason: None,
                last_error: None,
                updated_at: None,
            },
            metrics: MetricsSnapshot {
                summary: summary(&[("equity", 99.0), ("pnl", -1.0)]),
                series,
            },
            orders: vec![order("o-1")],
            trades: vec![trade("t-1")],
        }
    }

    #[test]
    fn tick_before_snapshot_is_dropped() {
        let mut merger = Merger::new();
        let applied = merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 100.5)]),
            open_orders: Some(vec![order("o-9")]),
        });
        assert!(!applied);
        assert!(merger.view().metrics().is_none());
        assert!(merger.view().orders().is_empty());
    }

    #[test]
    fn tick_keeps_series_and_replaces_summary() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        let sigma_before = merger.view().metrics().unwrap().series["sigma"].clone();

        assert!(merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 100.5)]),
            open_orders: None,
        }));

        let metrics = merger.view().metrics().unwrap();
        assert_eq!(metrics.series["sigma"], sigma_before);
        assert_eq!(metrics.summary.number("equity"), Some(100.5));
        assert_eq!(metrics.summary.number("pnl"), None);
        assert_eq!(merger.view().orders(), &[order("o-1")]);
        assert_eq!(merger.view().trades(), &[trade("t-1")]);
        assert_eq!(
            merger.view().status().unwrap().mode,
            EngineMode::Running
        );
    }

    #[test]
    fn tick_with_orders_replaces_orders_wholesale() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 100.0)]),
            open_orders: Some(vec![order("o-2"), order("o-3")]),
        });
        let ids: Vec<&str> = merger
            .view()
            .orders()
            .iter()
            .map(|o| o.order_id.as_str())
            .collect();
        assert_eq!(ids, vec!["o-2", "o-3"]);

        merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 100.0)]),
            open_orders: Some(Vec::new()),
        });
        assert!(merger.view().orders().is_empty());
    }

    #[test]
    fn applying_same_tick_twice_is_idempotent() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        let tick = TickPayload {
            summary: summary(&[("equity", 100.5), ("inventory_base", 0.3)]),
            open_orders: Some(vec![order("o-7")]),
        };

        merger.apply_tick(tick.clone());
        let once = merger.view().clone();
        merger.apply_tick(tick);
        assert_eq!(merger.view(), &once);
    }

    #[test]
    fn snapshot_after_tick_wins() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 500.0)]),
            open_orders: Some(Vec::new()),
        });
        merger.apply_snapshot(snapshot());
        let view = merger.view();
        assert_eq!(view.metrics().unwrap().summary.number("equity"), Some(99.0));
        assert_eq!(view.orders(), &[order("o-1")]);
    }

    #[test]
    fn ticks_do_not_refresh_freshness() {
        let mut merger = Merger::new();
        assert!(!merger.view().is_fresh(Instant::now(), Duration::from_secs(3)));
        merger.apply_snapshot(snapshot());
        let refreshed = merger.view().refreshed_at();
        assert!(refreshed.is_some());
        merger.apply_tick(TickPayload {
            summary: summary(&[("equity", 1.0)]),
            open_orders: None,
        });
        assert_eq!(merger.view().refreshed_at(), refreshed);
        assert!(merger.view().is_fresh(Instant::now(), Duration::from_secs(3)));
        assert!(!merger.view().is_fresh(
            Instant::now() + Duration::from_secs(10),
            Duration::from_secs(3)
        ));
    }

    #[test]
    fn close_messages_only_raise_notices() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        let before = merger.view().clone();

        merger.apply_stream(StreamMessage::CloseRetry {
            attempt: Some(2),
            error: None,
        });
        assert_eq!(
            merger.view().last_notice().unwrap().message,
            format!("{NOTICE_CLOSE_RETRY} (attempt 2)")
        );

        merger.apply_stream(StreamMessage::CloseDone {
            retries: Some(2),
            remaining_base: Some(0.0),
        });
        assert_eq!(merger.view().last_notice().unwrap().message, NOTICE_STOPPED);

        merger.apply_stream(StreamMessage::Unrecognized("engine".into()));
        assert_eq!(merger.view().status(), before.status());
        assert_eq!(merger.view().metrics(), before.metrics());
        assert_eq!(merger.view().orders(), before.orders());
    }

    #[test]
    fn reset_forgets_everything() {
        let mut merger = Merger::new();
        merger.apply_snapshot(snapshot());
        merger.set_error("boom");
        merger.set_connection_state(ConnectionState::Connected);
        merger.reset();
        assert_eq!(merger.view(), &ViewModel::default());
    }
}
