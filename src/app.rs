//! Dashboard state and user actions.

use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::coordinator::Coordinator;
use crate::live::{LiveSnapshot, LiveView};
use crate::ui::Theme;

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    coordinator: Coordinator,
    live: watch::Receiver<LiveSnapshot>,
    pub snapshot: LiveSnapshot,

    /// Backend base URL, for the header.
    pub endpoint: String,

    pub selected_metric: usize,

    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(coordinator: Coordinator, live: &LiveView, endpoint: impl Into<String>) -> Self {
        Self::with_theme(coordinator, live, endpoint, Theme::auto_detect())
    }

    pub fn with_theme(
        coordinator: Coordinator,
        live: &LiveView,
        endpoint: impl Into<String>,
        theme: Theme,
    ) -> Self {
        Self {
            running: true,
            show_help: false,
            coordinator,
            live: live.watch(),
            snapshot: live.snapshot(),
            endpoint: endpoint.into(),
            selected_metric: 0,
            theme,
            status_message: None,
        }
    }

    /// Pull the latest live snapshot. Returns true if it changed.
    pub fn refresh(&mut self) -> bool {
        if !self.live.has_changed().unwrap_or(false) {
            return false;
        }
        self.snapshot = self.live.borrow_and_update().clone();
        let max = self.snapshot.metrics.len().saturating_sub(1);
        self.selected_metric = self.selected_metric.min(max);
        true
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Manual retry; also resumes after automatic reconnection gave up.
    pub fn reconnect(&mut self) {
        self.coordinator.connect();
        self.set_status_message("Connecting...".to_string());
    }

    /// Move to the next transport preference (auto → sse → websocket).
    pub fn cycle_transport(&mut self) {
        let next = self.coordinator.snapshot().preference.next();
        self.coordinator.set_transport_preference(next);
        self.set_status_message(format!("Transport preference: {}", next));
    }

    pub fn refresh_topology(&mut self) {
        self.coordinator.request_topology_refresh();
        self.set_status_message("Topology refresh requested".to_string());
    }

    pub fn select_next(&mut self) {
        let max = self.snapshot.metrics.len().saturating_sub(1);
        self.selected_metric = (self.selected_metric + 1).min(max);
    }

    pub fn select_prev(&mut self) {
        self.selected_metric = self.selected_metric.saturating_sub(1);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rabbitwatch_types::TransportPreference;

    use crate::config::Settings;
    use crate::live::LiveViewConfig;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn offline_app() -> (Coordinator, LiveView, App) {
        let mut settings = Settings::default();
        settings.api.base_url = "http://127.0.0.1:1".to_string();
        let coordinator = Coordinator::from_settings(&settings).unwrap();
        let live = LiveView::spawn(&coordinator, LiveViewConfig::default());
        let app = App::with_theme(coordinator.clone(), &live, "test", Theme::dark());
        (coordinator, live, app)
    }

    #[tokio::test(start_paused = true)]
    async fn cycling_starts_from_the_coordinators_preference() {
        let (coordinator, _live, mut app) = offline_app();

        // Changed behind the dashboard's back.
        coordinator.set_transport_preference(TransportPreference::WebSocket);
        settle().await;

        app.cycle_transport();
        settle().await;
        assert_eq!(coordinator.snapshot().preference, TransportPreference::Auto);

        app.refresh();
        assert_eq!(app.snapshot.preference, TransportPreference::Auto);
        assert_eq!(app.get_status_message(), Some("Transport preference: auto"));
    }

    #[tokio::test(start_paused = true)]
    async fn selection_stays_in_bounds() {
        let (_coordinator, _live, mut app) = offline_app();

        app.select_next();
        assert_eq!(app.selected_metric, 0);
        app.select_prev();
        assert_eq!(app.selected_metric, 0);

        app.toggle_help();
        assert!(app.show_help);
        app.quit();
        assert!(!app.running);
    }
}
