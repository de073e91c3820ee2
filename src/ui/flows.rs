//! Recent message flows, newest first.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use rabbitwatch_types::{now_ms, MessageType};

use super::format_age;
use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let flows = &app.snapshot.flows;
    let now = now_ms();

    let header = Row::new(vec![
        Cell::from("Age"),
        Cell::from("Path"),
        Cell::from("Routing key"),
        Cell::from("Size"),
        Cell::from("Type"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = flows
        .iter()
        .rev()
        .map(|f| {
            let kind = match f.message_type {
                Some(MessageType::Priority) => "priority",
                Some(MessageType::DeadLetter) => "dead-letter",
                Some(MessageType::Normal) | None => "normal",
            };
            Row::new(vec![
                Cell::from(format_age(now.saturating_sub(f.timestamp))),
                Cell::from(f.hops().join(" → ")),
                Cell::from(f.routing_key.clone().unwrap_or_default()),
                Cell::from(format!("{}B", f.message_size)),
                Cell::from(kind).style(app.theme.message_type_style(f.message_type)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(6),  // Age
        Constraint::Fill(4), // Path
        Constraint::Fill(2), // Routing key
        Constraint::Min(8),  // Size
        Constraint::Min(11), // Type
    ];

    let title = if let Some(topology) = &app.snapshot.topology {
        format!(
            " Flows ({}) │ topology: {} nodes, {} edges ",
            flows.len(),
            topology.nodes.len(),
            topology.edges.len()
        )
    } else {
        format!(" Flows ({}) ", flows.len())
    };

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(app.theme.border))
            .title_style(Style::default().add_modifier(Modifier::BOLD)),
    );

    frame.render_widget(table, area);
}
