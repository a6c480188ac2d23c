//! Terminal front-end for the operator console.
//!
//! Renders the view model and maps keys to commands. All state lives in
//! [`Console`](crate::console::Console); this module only reads it.

pub mod components;
pub mod event;
pub mod terminal;
pub mod ui;

pub use event::{Action, handle_key, spawn_event_reader, spawn_tick_timer};
pub use terminal::{Tui, restore_terminal, setup_terminal};
pub use ui::render;
