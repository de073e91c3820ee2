//! Metrics table: latest metric per node.

use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use rabbitwatch_types::now_ms;

use super::{format_age, format_count};
use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let metrics = &app.snapshot.metrics;
    let now = now_ms();

    let header = Row::new(vec![
        Cell::from("Node"),
        Cell::from("Rate"),
        Cell::from("Messages"),
        Cell::from("Consumers"),
        Cell::from("Age"),
        Cell::from("Status"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = metrics
        .iter()
        .map(|m| {
            Row::new(vec![
                Cell::from(m.node_id.clone()),
                Cell::from(format!("{:.1}/s", m.message_rate)),
                Cell::from(m.message_count.map(format_count).unwrap_or_else(|| "-".to_string())),
                Cell::from(
                    m.consumer_count
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(format_age(now.saturating_sub(m.timestamp))),
                Cell::from(m.status.label()).style(app.theme.node_style(m.status)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(3), // Node
        Constraint::Fill(1), // Rate
        Constraint::Fill(1), // Messages
        Constraint::Fill(1), // Consumers
        Constraint::Min(6),  // Age
        Constraint::Min(8),  // Status
    ];

    let selected = app.selected_metric.min(metrics.len().saturating_sub(1));
    let position_info = if !metrics.is_empty() {
        format!(" [{}/{}]", selected + 1, metrics.len())
    } else {
        String::new()
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" Metrics{} ", position_info))
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    if !metrics.is_empty() {
        state.select(Some(selected));
    }

    frame.render_stateful_widget(table, area, &mut state);
}
