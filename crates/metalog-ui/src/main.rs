mod config;
mod state;
mod theme;
mod ui;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use metalog_storage::MetalogStore;
use ratatui::{backend::CrosstermBackend, Terminal};
use state::{App, AppEvent};
use std::{
    fs::OpenOptions,
    io,
    path::Path,
    process::ExitCode,
    sync::Mutex,
    time::Instant,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("metalog-ui: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = config::load();
    init_logging(config.log_file.as_deref())?;

    ensure_db_exists(&config.db_path)?;
    let store = MetalogStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    info!(
        path = %config.db_path.display(),
        interval_secs = config.refresh_period.as_secs(),
        "opened metalog"
    );

    let mut app = App::new(config, store);
    // Load before touching the terminal so a bad file never leaves raw mode on.
    app.refresh_if_due(Instant::now())?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app).await;
    restore_terminal(&mut terminal)?;
    result
}

/// Checked before the terminal is touched so the message lands on a normal
/// stderr and the exit status is 1.
fn ensure_db_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("database file not found: {}", path.display());
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// One event at a time: each input or tick runs its full cascade before the
/// next one is read.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|f| ui::render(f, app))?;
        if app.should_quit() {
            break;
        }

        let deadline = tokio::time::Instant::from_std(app.next_refresh_deadline(Instant::now()));
        let event = tokio::select! {
            biased;
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => AppEvent::Input(event),
                Some(Err(err)) => return Err(err).context("failed to read terminal input"),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => AppEvent::Tick,
        };
        app.dispatch(event)?;
    }

    info!(refreshes = app.scheduler.completed(), "dashboard closed");
    Ok(())
}
