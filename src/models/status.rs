//! Engine status model.

use serde::{Deserialize, Serialize};

/// Operating mode reported by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    #[default]
    Idle,
    /// Connected and observing but not quoting.
    Readonly,
    Running,
    /// Stopped by a risk guard; needs operator attention.
    Halted,
    /// Any mode this client does not know about.
    #[serde(other)]
    Unknown,
}

impl EngineMode {
    /// Returns the wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Idle => "idle",
            EngineMode::Readonly => "readonly",
            EngineMode::Running => "running",
            EngineMode::Halted => "halted",
            EngineMode::Unknown => "unknown",
        }
    }

    /// Whether exchange and alerting credentials may be edited in this mode.
    pub fn allows_credential_edits(&self) -> bool {
        matches!(self, EngineMode::Idle | EngineMode::Halted)
    }
}

/// Response of `GET /api/status`. Replaced wholesale on every snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub mode: EngineMode,
    pub symbol: String,
    #[serde(default)]
    pub engine_running: Option<bool>,
    #[serde(default)]
    pub exchange_connected: Option<bool>,
    /// Why a risk guard halted the engine.
    #[serde(default)]
    pub kill_reason: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
