use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use eventtui::action::Action;
use eventtui::app::App;
use eventtui::components::Component;
use eventtui::config::Config;
use eventtui::services::MockEventFetcher;
use eventtui::tui::Event as TuiEvent;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::error;

/// Terminal console for browsing and filtering venue events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Simulated data source latency in milliseconds
    #[arg(long = "delay-ms", default_value_t = 500)]
    delay_ms: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cwd = std::env::current_dir()?;
    let log_path = cwd.join("eventtui.log");
    let level = match args.logging {
        Some(LogLevel::Error) => Some(tracing::Level::ERROR),
        Some(LogLevel::Warn) => Some(tracing::Level::WARN),
        Some(LogLevel::Info) => Some(tracing::Level::INFO),
        Some(LogLevel::Debug) => Some(tracing::Level::DEBUG),
        Some(LogLevel::Trace) => Some(tracing::Level::TRACE),
        None => Some(tracing::Level::WARN),
    };
    eventtui::logging::init_with(Some(log_path), level)?;

    let config = Config::from_path(args.config.as_ref())?;
    let fetcher = MockEventFetcher::new(Duration::from_millis(args.delay_ms));
    let mut app = App::new(config, fetcher)?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.init(terminal.size()?)?;
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    if let Err(e) = res {
        error!("Error: {e}");
    }
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| {
            let size = f.area();
            if let Err(e) = app.draw(f, size) {
                error!("Error drawing app: {e}");
            }
        })?;

        // Poll for events
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                CEvent::Key(key_event) => {
                    if let Err(e) = app.handle_events(Some(TuiEvent::Key(key_event))) {
                        error!("Error handling key event: {e}");
                    }
                }
                CEvent::Resize(w, h) => {
                    let _ = app.update(Action::Resize(w, h));
                }
                _ => {}
            }
        }

        // Apply actions sent back from spawned fetch tasks
        app.drain_pending()?;
        if app.should_quit() {
            break;
        }
        let _ = app.update(Action::Tick);
    }
    Ok(())
}
