//! Terminal UI rendering using ratatui.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Metrics table (metrics::render)      │
//! ├──────────────────────────────────────┤
//! │ Recent flows (flows::render)         │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    common::render_help is drawn on top when open
//! ```

pub mod common;
pub mod flows;
pub mod metrics;
pub mod theme;

pub use theme::Theme;

/// Format an age in milliseconds as a short string ("850ms", "12s", "3m").
pub fn format_age(age_ms: u64) -> String {
    if age_ms < 1_000 {
        format!("{}ms", age_ms)
    } else if age_ms < 60_000 {
        format!("{}s", age_ms / 1_000)
    } else {
        format!("{}m", age_ms / 60_000)
    }
}

/// Format a count for display (e.g., 1234 -> "1.2K", 1234567 -> "1.2M").
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
