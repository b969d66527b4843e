use std::io;
use std::time::Duration;

use clap::Parser;
use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod api;
mod app;
mod cli;
mod config;
mod editor;
mod error;
mod history;
mod models;
mod notify;
mod tracker;
mod tui;
mod upload;

use app::App;
use cli::Cli;
use config::Config;
use error::Result;
use notify::{NoticeKind, Notifier};
use tui::{draw, handle_key_event};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.command.is_none());

    let mut config = Config::load()?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
        config.validate()?;
    }

    // Headless commands
    if let Some(command) = cli.command {
        return cli::run(command, &config).await;
    }

    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    restore_terminal(&mut terminal)?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

/// The TUI owns the terminal, so its logs go to a file in the data dir.
fn init_logging(verbose: bool, tui: bool) {
    let level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("pdfsum={level}")));

    if tui {
        let path = Config::data_dir().join("pdfsum.log");
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Advance spinner animation
        app.tick_spinner();

        // Apply finished background work and generation updates
        app.poll_background();

        // External editor needs the real terminal
        if let Some(summary) = app.take_edit_request() {
            restore_terminal(terminal)?;
            let edited = editor::edit_text(&summary.content);
            enable_raw_mode()?;
            execute!(terminal.backend_mut(), EnterAlternateScreen, EnableMouseCapture)?;
            terminal.clear()?;

            match edited {
                Ok(Some(content)) => app.submit_edit(&summary.id, content),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Editor failed: {}", e);
                    app.toasts.notify("Failed to open editor", NoticeKind::Error);
                }
            }
        }

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.key_mode()) {
                        if app.handle_action(action) {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
