//! Wire models for the engine backend's REST and push APIs.
//!
//! Contains the engine status, metrics, order and trade records returned by
//! the snapshot endpoints, the login exchange, and the decoded form of push
//! channel messages.

pub mod auth;
pub mod metrics;
pub mod orders;
pub mod status;
pub mod stream;
pub mod trade;

use serde::{Deserialize, Serialize};

pub use metrics::{MetricsSnapshot, SeriesPoint, Summary};
pub use orders::Order;
pub use status::{EngineMode, EngineStatus};
pub use stream::{StreamMessage, TickPayload};
pub use trade::Trade;

/// Order or trade direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// A full-resolution pull of every tracked field, applied atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub status: EngineStatus,
    pub metrics: MetricsSnapshot,
    pub orders: Vec<Order>,
    pub trades: Vec<Trade>,
}

/// Response to `POST /api/engine/start` and `POST /api/engine/stop`.
///
/// Informational only; observed state always comes from the next snapshot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EngineCommandAck {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mode: Option<String>,
}
