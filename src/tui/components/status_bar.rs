//! Status bar component.

use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::merger::ViewModel;
use crate::models::EngineMode;
use crate::stream::ConnectionState;

/// Whether the last snapshot is older than two poll intervals.
///
/// A view that has never received a snapshot is not stale, it is empty.
pub fn is_stale(view: &ViewModel, now: Instant, poll_interval: Duration) -> bool {
    view.refreshed_at().is_some() && !view.is_fresh(now, poll_interval * 2)
}

/// Renders engine mode, symbol, push channel state and snapshot age.
pub fn render(frame: &mut Frame, area: Rect, view: &ViewModel, poll_interval: Duration) {
    let now = Instant::now();

    let (mode, symbol) = match view.status() {
        Some(status) => (status.mode, status.symbol.as_str()),
        None => (EngineMode::Unknown, "--"),
    };
    let mode_color = match mode {
        EngineMode::Running => Color::Green,
        EngineMode::Halted => Color::Red,
        EngineMode::Readonly => Color::Cyan,
        EngineMode::Idle | EngineMode::Unknown => Color::Yellow,
    };

    let connection = view.connection_state();
    let connection_color = match connection {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting | ConnectionState::Reconnecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    };

    let age_span = match view.snapshot_age(now) {
        Some(age) if is_stale(view, now, poll_interval) => Span::styled(
            format!(" STALE {}s ", age.as_secs()),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        Some(age) => Span::styled(
            format!(" {}s ago ", age.as_secs()),
            Style::default().fg(Color::White),
        ),
        None => Span::styled(" no data ", Style::default().fg(Color::DarkGray)),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {symbol} "),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("│"),
        Span::styled(
            format!(" {} ", mode.as_str().to_uppercase()),
            Style::default().fg(mode_color),
        ),
        Span::raw("│"),
        Span::styled(
            format!(" {} ", connection.label()),
            Style::default().fg(connection_color),
        ),
        Span::raw("│"),
        age_span,
    ]);

    let para = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}
