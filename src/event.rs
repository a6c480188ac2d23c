//! Messages flowing into the console's single event loop.
//!
//! Every producer (poll timer, push channel, command tasks, terminal input)
//! sends [`Message`]s over one unbounded channel. Updates carry the session
//! epoch their producer was started under so the console can drop anything
//! that outlived its session.

use crossterm::event::KeyEvent;

use crate::error::ConsoleError;
use crate::models::{Snapshot, StreamMessage};
use crate::stream::ConnectionState;

/// Terminal events.
#[derive(Debug)]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// Terminal was resized.
    Resize(u16, u16),
    /// Periodic redraw tick.
    Tick,
}

/// Anything the event loop reacts to.
#[derive(Debug)]
pub enum Message {
    /// Input from the terminal.
    Input(Event),
    /// A state update produced under session `epoch`.
    Update { epoch: u64, update: Update },
}

impl Message {
    pub fn update(epoch: u64, update: Update) -> Self {
        Message::Update { epoch, update }
    }
}

/// State updates applied by the console.
#[derive(Debug)]
pub enum Update {
    /// All four snapshot requests succeeded.
    Snapshot(Snapshot),
    /// A decoded push message.
    Stream(StreamMessage),
    /// The push channel changed state.
    Connection(ConnectionState),
    /// The push channel saw an auth rejection and cleared the credential.
    SessionExpired,
    /// An advisory message for the operator.
    Notice(String),
    /// A poll, command or configuration request failed.
    Failed(ConsoleError),
    /// A new command started; the previous error no longer applies.
    ErrorCleared,
}
