//! Metrics snapshot model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Point-in-time scalars (equity, pnl, inventory, spread, sigma, ...).
///
/// Kept as raw JSON values because the engine mixes a few non-numeric fields
/// (`timestamp`, `mode`, `requote_reason`) into the same object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(pub BTreeMap<String, serde_json::Value>);

impl Summary {
    /// Returns a numeric field, or `None` if absent or not a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Returns a string field, or `None` if absent or not a string.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }
}

/// One sample of a rolling chart series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(rename = "t", alias = "timestamp")]
    pub timestamp: String,
    pub value: f64,
}

/// Response of `GET /api/metrics`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub summary: Summary,
    /// Bounded rolling histories keyed by metric name.
    #[serde(default)]
    pub series: BTreeMap<String, Vec<SeriesPoint>>,
}
