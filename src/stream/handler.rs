//! Incoming push frame decoding.

use serde_json::Value;
use tracing::debug;

use crate::models::{Order, StreamMessage, Summary, TickPayload};

/// Decodes one text frame of the push channel.
///
/// Frames are JSON objects `{type, payload}`. Anything that is not valid
/// JSON, has no string `type`, or is a `tick` without an object `summary`
/// yields `None` and is dropped without surfacing an error. Unknown tags
/// decode to [`StreamMessage::Unrecognized`].
pub fn decode_frame(text: &str) -> Option<StreamMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "discarding malformed push frame");
            return None;
        }
    };

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        debug!("discarding push frame without a type tag");
        return None;
    };
    let payload = value.get("payload");

    match kind {
        "tick" => decode_tick(payload),
        "close_retry" => Some(StreamMessage::CloseRetry {
            attempt: payload.and_then(|p| p.get("attempt")).and_then(as_u32),
            error: payload
                .and_then(|p| p.get("error"))
                .and_then(Value::as_str)
                .map(String::from),
        }),
        "close_done" => Some(StreamMessage::CloseDone {
            retries: payload.and_then(|p| p.get("retries")).and_then(as_u32),
            remaining_base: payload
                .and_then(|p| p.get("remaining_base"))
                .and_then(Value::as_f64),
        }),
        other => Some(StreamMessage::Unrecognized(other.to_string())),
    }
}

/// A tick must carry a summary object; `open_orders` is optional and is
/// ignored when it is not a valid order list.
fn decode_tick(payload: Option<&Value>) -> Option<StreamMessage> {
    let payload = payload?;
    let summary = match payload.get("summary") {
        Some(summary @ Value::Object(_)) => serde_json::from_value::<Summary>(summary.clone()).ok()?,
        _ => {
            debug!("discarding tick without a summary");
            return None;
        }
    };

    let open_orders = payload
        .get("open_orders")
        .filter(|orders| orders.is_array())
        .and_then(|orders| match serde_json::from_value::<Vec<Order>>(orders.clone()) {
            Ok(orders) => Some(orders),
            Err(e) => {
                debug!(error = %e, "ignoring undecodable open_orders in tick");
                None
            }
        });

    Some(StreamMessage::Tick(TickPayload {
        summary,
        open_orders,
    }))
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}
