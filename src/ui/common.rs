//! Header bar, status bar and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use rabbitwatch_types::{now_ms, ConnectionStatus, NodeStatus};

use super::format_age;
use crate::app::App;

/// Render the header bar: link status, transport preference, endpoint and
/// node counts by status.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = &app.snapshot;
    let status = snapshot.status;

    let link = match status {
        ConnectionStatus::Reconnecting => format!(
            "{} {}/{}",
            status, snapshot.reconnect_attempts, snapshot.max_reconnect_attempts
        ),
        _ => status.to_string(),
    };

    let mut active = 0;
    let mut warning = 0;
    let mut error = 0;
    for metric in &snapshot.metrics {
        match metric.status {
            NodeStatus::Active => active += 1,
            NodeStatus::Warning => warning += 1,
            NodeStatus::Error => error += 1,
            NodeStatus::Idle => {}
        }
    }

    let line = Line::from(vec![
        Span::styled(" ● ", app.theme.link_style(status)),
        Span::styled("RABBITWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(link, app.theme.link_style(status)),
        Span::raw(format!(" │ pref:{} │ {} │ ", snapshot.preference, app.endpoint)),
        Span::styled(format!("{}", active), Style::default().fg(app.theme.healthy)),
        Span::raw(" active "),
        if warning > 0 {
            Span::styled(format!("{}", warning), Style::default().fg(app.theme.warning))
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" warn "),
        if error > 0 {
            Span::styled(
                format!("{}", error),
                Style::default().fg(app.theme.critical).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" err │ "),
        Span::raw(format!("{} nodes", snapshot.metrics.len())),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// A temporary status message wins; otherwise shows the latest connection
/// event and the controls.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = "r:reconnect t:transport f:topology ?:help q:quit";

    let line = match &app.snapshot.last_event {
        Some(event) => {
            let age = format_age(now_ms().saturating_sub(event.timestamp));
            let message = event.message.as_deref().unwrap_or("");
            Line::from(vec![
                Span::raw(" "),
                Span::styled(format!("{:?}", event.kind).to_lowercase(), app.theme.event_style(event.kind)),
                Span::raw(format!(" {} ({} ago) | ", message, age)),
                Span::styled(controls, Style::default().add_modifier(Modifier::DIM)),
            ])
        }
        None => Line::from(vec![Span::styled(
            format!(" Waiting for connection... | {}", controls),
            Style::default().add_modifier(Modifier::DIM),
        )]),
    };

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the help overlay with keyboard shortcuts.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from("  ↑/↓ j/k   Select node"),
        Line::from("  r         Reconnect now"),
        Line::from("  t         Cycle transport (auto/sse/websocket)"),
        Line::from("  f         Refresh topology"),
        Line::from("  q Esc     Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 48u16.min(area.width.saturating_sub(4));
    let help_height = 12u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
