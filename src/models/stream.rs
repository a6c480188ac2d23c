//! Decoded push channel messages.

use super::{Order, Summary};

/// A server-to-client message on the push channel.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    /// Incremental update carrying fresh summary metrics.
    Tick(TickPayload),
    /// A taker close of the remaining position failed and is being retried.
    CloseRetry {
        attempt: Option<u32>,
        error: Option<String>,
    },
    /// The position has been flattened after a stop.
    CloseDone {
        retries: Option<u32>,
        remaining_base: Option<f64>,
    },
    /// A well-formed message with a tag this client ignores.
    Unrecognized(String),
}

/// Payload of a `tick` message.
#[derive(Clone, Debug, PartialEq)]
pub struct TickPayload {
    pub summary: Summary,
    /// Full open-order list, when the engine included one.
    pub open_orders: Option<Vec<Order>>,
}
