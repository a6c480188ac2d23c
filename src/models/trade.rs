//! Trade model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// A fill from the engine's bounded recent-trades window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    /// Whether the fee was charged as maker or taker.
    #[serde(default)]
    pub fee_side: Option<String>,
    pub created_at: String,
}
