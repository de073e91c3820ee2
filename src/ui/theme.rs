//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use rabbitwatch_types::{ConnectionEventKind, ConnectionStatus, MessageType, NodeStatus};

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    pub warning: Color,
    pub critical: Color,
    pub healthy: Color,
    /// Idle nodes and other quiet values.
    pub muted: Color,
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            muted: Color::Gray,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            muted: Color::DarkGray,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Style for a node's reported status.
    pub fn node_style(&self, status: NodeStatus) -> Style {
        match status {
            NodeStatus::Active => Style::default().fg(self.healthy),
            NodeStatus::Idle => Style::default().fg(self.muted),
            NodeStatus::Warning => Style::default().fg(self.warning),
            NodeStatus::Error => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
        }
    }

    /// Style for the overall link indicator.
    pub fn link_style(&self, status: ConnectionStatus) -> Style {
        match status {
            ConnectionStatus::DualConnected
            | ConnectionStatus::SseConnected
            | ConnectionStatus::WsConnected => Style::default().fg(self.healthy),
            ConnectionStatus::Reconnecting => Style::default().fg(self.warning),
            ConnectionStatus::Disconnected => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    pub fn event_style(&self, kind: ConnectionEventKind) -> Style {
        match kind {
            ConnectionEventKind::Connected => Style::default().fg(self.healthy),
            ConnectionEventKind::Reconnecting => Style::default().fg(self.warning),
            ConnectionEventKind::Disconnected => Style::default().fg(self.warning),
            ConnectionEventKind::Error => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    pub fn message_type_style(&self, kind: Option<MessageType>) -> Style {
        match kind {
            Some(MessageType::Priority) => Style::default().fg(self.highlight),
            Some(MessageType::DeadLetter) => Style::default().fg(self.critical),
            Some(MessageType::Normal) | None => Style::default(),
        }
    }
}
