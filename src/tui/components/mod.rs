//! Reusable TUI components.

pub mod status_bar;
