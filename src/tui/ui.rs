//! Main UI rendering coordinator.

use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::merger::ViewModel;
use crate::models::Side;
use crate::tui::components::status_bar;

/// Renders the entire console.
pub fn render(frame: &mut Frame, view: &ViewModel, poll_interval: Duration) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Status bar
            Constraint::Min(8),    // Metrics | Orders
            Constraint::Length(10), // Trades
            Constraint::Length(1), // Notice / error
            Constraint::Length(1), // Keybindings help
        ])
        .split(area);

    status_bar::render(frame, main_layout[0], view, poll_interval);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(main_layout[1]);

    render_metrics(frame, middle[0], view);
    render_orders(frame, middle[1], view);
    render_trades(frame, main_layout[2], view);
    render_banner(frame, main_layout[3], view);
    render_keybindings(frame, main_layout[4]);
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Buy => Color::Green,
        Side::Sell => Color::Red,
    }
}

/// Extracts the HH:MM:SS portion of an RFC3339 timestamp.
fn extract_time(timestamp: &str) -> &str {
    match timestamp.split_once('T') {
        Some((_, time)) => {
            let end = time.find(['.', 'Z', '+']).unwrap_or(time.len());
            time.get(..end.min(8)).unwrap_or(time)
        }
        None => timestamp,
    }
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.4}"),
            _ => n.to_string(),
        },
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "--".to_string(),
        other => other.to_string(),
    }
}

fn render_metrics(frame: &mut Frame, area: Rect, view: &ViewModel) {
    let block = Block::default()
        .title(" Metrics ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(status) = view.status() {
        if let Some(reason) = &status.kill_reason {
            lines.push(Line::from(Span::styled(
                format!("kill: {reason}"),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }
        if let Some(connected) = status.exchange_connected {
            let (label, color) = if connected {
                ("exchange: connected", Color::Green)
            } else {
                ("exchange: disconnected", Color::Red)
            };
            lines.push(Line::from(Span::styled(label, Style::default().fg(color))));
        }
    }

    match view.metrics() {
        Some(metrics) => {
            for (key, value) in metrics.summary.0.iter().take(inner.height as usize) {
                lines.push(Line::from(vec![
                    Span::styled(format!("{key:<18}"), Style::default().fg(Color::DarkGray)),
                    Span::raw(format!("{:>14}", format_value(value))),
                ]));
            }
        }
        None => lines.push(Line::from(Span::styled(
            "Waiting for first snapshot",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_orders(frame: &mut Frame, area: Rect, view: &ViewModel) {
    let block = Block::default()
        .title(format!(" Open Orders ({}) ", view.orders().len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        format!("{:<14} {:<5} {:>12} {:>10} {:<10}", "ID", "Side", "Price", "Size", "Status"),
        Style::default().add_modifier(Modifier::BOLD),
    ))];

    for order in view
        .orders()
        .iter()
        .take(inner.height.saturating_sub(1) as usize)
    {
        let id_short = if order.order_id.chars().count() > 12 {
            let short: String = order.order_id.chars().take(12).collect();
            format!("{short}..")
        } else {
            order.order_id.clone()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{id_short:<14} ")),
            Span::styled(
                format!("{:<5} ", order.side.as_str().to_uppercase()),
                Style::default().fg(side_color(order.side)),
            ),
            Span::raw(format!("{:>12.2} ", order.price)),
            Span::raw(format!("{:>10.4} ", order.size)),
            Span::raw(format!("{:<10}", order.status)),
        ]));
    }

    if lines.len() == 1 {
        lines.push(Line::from(Span::styled(
            "No orders",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_trades(frame: &mut Frame, area: Rect, view: &ViewModel) {
    let block = Block::default()
        .title(" Recent Trades ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        format!(
            "{:<9} {:<5} {:>12} {:>10} {:>10} {:<6}",
            "Time", "Side", "Price", "Size", "Fee", "Liq"
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ))];

    for trade in view
        .trades()
        .iter()
        .take(inner.height.saturating_sub(1) as usize)
    {
        lines.push(Line::from(vec![
            Span::raw(format!("{:<9} ", extract_time(&trade.created_at))),
            Span::styled(
                format!("{:<5} ", trade.side.as_str().to_uppercase()),
                Style::default().fg(side_color(trade.side)),
            ),
            Span::raw(format!("{:>12.2} ", trade.price)),
            Span::raw(format!("{:>10.4} ", trade.size)),
            Span::raw(format!("{:>10.6} ", trade.fee)),
            Span::raw(format!("{:<6}", trade.fee_side.as_deref().unwrap_or("-"))),
        ]));
    }

    if lines.len() == 1 {
        lines.push(Line::from(Span::styled(
            "No trades",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Errors take precedence over notices.
fn render_banner(frame: &mut Frame, area: Rect, view: &ViewModel) {
    let line = if let Some(error) = view.last_error() {
        Line::from(Span::styled(
            format!(" {} ", error.message),
            Style::default().fg(Color::White).bg(Color::Red),
        ))
    } else if let Some(notice) = view.last_notice() {
        Line::from(Span::styled(
            format!(" {} ", notice.message),
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_keybindings(frame: &mut Frame, area: Rect) {
    let help = "[s]tart [x] stop [r]efresh [L]ogout [q]uit";
    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}
