use anyhow::{Context, Result};
use clap::Parser;
use rebecca_core::{Config, CredentialStore};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, Screen, Settings};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "rebecca")]
#[command(version, about = "Chat with Rebecca from the terminal, with streamed and spoken replies")]
struct Cli {
    /// Base URL of the Rebecca API (overrides config and REBECCA_API_URL)
    #[arg(long)]
    api_url: Option<String>,
    /// Model name sent with every chat request
    #[arg(short, long)]
    model: Option<String>,
    /// Don't speak finished replies
    #[arg(long)]
    no_speech: bool,
    /// Forget the stored login and exit
    #[arg(long)]
    logout: bool,
}

/// Log to a daily rolling file. The terminal belongs to the UI, so nothing
/// is written to stdout or stderr.
fn setup_logging() -> Result<WorkerGuard> {
    let logs_dir = Config::logs_dir()?;
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "rebecca.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .context("Unable to set a global subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging()?;

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!("Using default config: {:#}", err);
        Config::new()
    });
    let credentials = CredentialStore::default_location()?;

    if cli.logout {
        credentials.clear()?;
        println!("Logged out.");
        return Ok(());
    }

    let mut settings = Settings::from_config(&config);
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if cli.no_speech {
        settings.speech_enabled = false;
    }
    tracing::info!(api_url = %settings.api_url, model = %settings.model, "starting");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, settings, credentials).await;
    tui::restore()?;

    if let Err(err) = &result {
        tracing::error!("exited with error: {:#}", err);
    }
    result
}

async fn run(terminal: &mut tui::Tui, settings: Settings, credentials: CredentialStore) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(settings, credentials);
    app.attach_events(events.sender());

    if app.screen == Screen::Chat {
        app.load_history();
    }

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    Ok(())
}
