//! Live state-sync layer for a market-making engine's operator console.
//!
//! Keeps a client-side view of the engine (status, metrics, open orders,
//! recent trades, push channel state) current by combining a periodic REST
//! snapshot poll with an incremental websocket push channel, and dispatches
//! operator commands through the same authenticated gateway.

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod merger;
pub mod models;
pub mod poller;
pub mod session;
pub mod stream;
pub mod tls;
pub mod tui;

pub use error::{ConsoleError, Result};
