use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rabbitwatch::app::App;
use rabbitwatch::config::{Overrides, Settings};
use rabbitwatch::{events, ui, Coordinator, LiveView, LiveViewConfig};
use rabbitwatch_types::{ConnectionEvent, ConnectionEventKind};

#[derive(Parser, Debug)]
#[command(name = "rabbitwatch")]
#[command(about = "Real-time RabbitMQ topology monitor with SSE/WebSocket fallback")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Monitoring backend base URL (e.g., "http://localhost:3001")
    #[arg(short, long)]
    api_url: Option<String>,

    /// Transport preference: auto, sse or websocket
    #[arg(short, long)]
    transport: Option<String>,

    /// Log events to stderr instead of drawing the dashboard
    #[arg(long)]
    headless: bool,

    /// Headless only: start over after automatic reconnection gives up
    #[arg(long, requires = "headless")]
    retry_forever: bool,

    /// Log filter (e.g., "info", "rabbitwatch=debug")
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs to this file (dashboard mode only logs when set)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.log_file.as_deref(), args.headless)?;

    let overrides = Overrides {
        base_url: args.api_url.clone(),
        preference: args.transport.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    info!(
        endpoint = %settings.api.base_url,
        preference = %settings.transport.preference,
        "starting rabbitwatch"
    );

    let rt = tokio::runtime::Runtime::new()?;

    let result = if args.headless {
        rt.block_on(run_headless(&settings, args.retry_forever))
    } else {
        let _guard = rt.enter();
        run_dashboard(&settings)
    };

    rt.shutdown_timeout(Duration::from_secs(1));
    result
}

fn init_logging(level: &str, log_file: Option<&Path>, headless: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?,
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    // Dashboard without a log file: the terminal belongs to the UI.

    Ok(())
}

/// Log connection events and a periodic summary until Ctrl-C.
async fn run_headless(settings: &Settings, retry_forever: bool) -> Result<()> {
    let coordinator = Coordinator::from_settings(settings)?;
    let live = LiveView::spawn(&coordinator, LiveViewConfig::from(settings));
    let mut events = coordinator.on_connection();

    coordinator.connect();

    let mut summary = tokio::time::interval(Duration::from_secs(10));
    summary.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            Some(event) = events.recv() => {
                if log_connection_event(&event, retry_forever) {
                    coordinator.connect();
                }
            }
            _ = summary.tick() => {
                let snapshot = live.snapshot();
                info!(
                    status = %snapshot.status,
                    nodes = snapshot.metrics.len(),
                    flows = snapshot.flows.len(),
                    topology_updates = snapshot.topology_updates,
                    "summary"
                );
            }
        }
    }

    coordinator.shutdown();
    Ok(())
}

/// Log one connection event. Returns true if the caller should start a new
/// connection attempt.
fn log_connection_event(event: &ConnectionEvent, retry_forever: bool) -> bool {
    let message = event.message.as_deref().unwrap_or("");
    match event.kind {
        ConnectionEventKind::Connected => info!(%message, "connected"),
        ConnectionEventKind::Disconnected => warn!(%message, "disconnected"),
        ConnectionEventKind::Reconnecting => {
            warn!(%message, attempt = ?event.attempt, "reconnecting")
        }
        ConnectionEventKind::Error if retry_forever => {
            warn!(%message, "automatic reconnection gave up; retrying from scratch");
            return true;
        }
        ConnectionEventKind::Error => {
            error!(%message, "automatic reconnection gave up; restart to try again");
        }
    }
    false
}

/// Run the dashboard on the current thread; the coordinator runs on the
/// runtime entered by the caller.
fn run_dashboard(settings: &Settings) -> Result<()> {
    let coordinator = Coordinator::from_settings(settings)?;
    let live = LiveView::spawn(&coordinator, LiveViewConfig::from(settings));
    coordinator.connect();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let mut app = App::new(coordinator.clone(), &live, settings.api.base_url.clone());

    let result = run_app(&mut terminal, &mut app);

    coordinator.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        app.refresh();

        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(
                    0,
                    (area.height / 2).saturating_sub(2),
                    area.width,
                    5.min(area.height),
                );
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1),      // Header bar
                Constraint::Min(6),         // Metrics
                Constraint::Percentage(40), // Flows
                Constraint::Length(1),      // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::metrics::render(frame, app, chunks[1]);
            ui::flows::render(frame, app, chunks[2]);
            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    Ok(())
}
