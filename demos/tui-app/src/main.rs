//! Terminal client for rehab coaching sessions.
//!
//! Run with: cargo run -p tui-app
//!
//! Talks to the agent backend at `REHAB_API_URL` for credentials and agent
//! activation. Build with `--features microphone` to drive the visualizer
//! from the default input device. Logs go to `tui-app.log`.

mod app;
mod offline;
mod ui;

use std::{fs::File, io, sync::Arc, time::Duration};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rehab_session::{SessionConfig, SessionController};
use rehab_transport::{HttpBackend, tui::Command};
use rehab_visualizer::{CaptureSource, VisualizationLoop, VisualizerConfig};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::App,
    offline::{NoPlayback, OfflineConnector},
};

const LOG_FILE: &str = "tui-app.log";
const REDRAW_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log = File::create(LOG_FILE).with_context(|| format!("creating {LOG_FILE}"))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(log))
                .with_ansi(false),
        )
        .init();

    let config = SessionConfig::from_env()?;
    let backend = HttpBackend::new(config.api_base_url.clone(), config.request_timeout)?;
    tracing::info!(api = backend.base_url(), "using agent backend");

    let controller = SessionController::new(
        config,
        Arc::new(backend),
        Arc::new(OfflineConnector),
        Arc::new(NoPlayback),
    );
    let visualizer = Arc::new(VisualizationLoop::new(
        capture_source(),
        controller.speaking(),
        VisualizerConfig::default(),
    )?);
    let frames = visualizer.subscribe();
    let controller = Arc::new(controller.with_visualizer(visualizer));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_app(&mut terminal, App::new(controller, frames)).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[cfg(feature = "microphone")]
fn capture_source() -> Arc<dyn CaptureSource> {
    Arc::new(rehab_visualizer::MicrophoneCapture::default())
}

#[cfg(not(feature = "microphone"))]
fn capture_source() -> Arc<dyn CaptureSource> {
    Arc::new(rehab_visualizer::NoCapture)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
) -> anyhow::Result<()> {
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !app.quit {
        redraw.tick().await;
        app.drain();
        terminal.draw(|f| ui::draw(f, &app))?;

        // Only read input that is already queued; waiting happens on the timer.
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = Command::from_key(&key) {
                        app.handle(command);
                    }
                }
            }
        }
    }

    app.controller.close().await;
    Ok(())
}
