//! Open order model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// A resting order, as listed by `GET /api/orders/open` and in ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}
