//! OurSchool terminal shell.
//!
//! Hosts a `SessionController` so a signed-in session stays alive while the
//! user works, and offers one-shot commands to sign in, inspect, extend and
//! end the stored session.

mod app;
mod commands;
mod ui;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ourschool_core::{
    ApiClient, Config, CredentialStore, FileStore, KeyringStore, SessionController, StoreBackend,
    SystemClock,
};

use app::App;

/// Log file name inside the cache directory
const LOG_FILE: &str = "ourschool.log";

#[derive(Parser)]
#[command(name = "ourschool", version, about = "Keep your OurSchool session alive")]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, env = "OURSCHOOL_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with a bearer token issued by the OurSchool backend
    Login {
        #[arg(long, env = "OURSCHOOL_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Show the stored session
    Status,
    /// End the stored session
    Logout,
    /// Exchange the stored token for a fresh one
    Extend,
    /// Watch the session interactively (default)
    Watch,
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file in the cache directory so they never draw over the UI.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

fn credential_store(config: &Config, cache_dir: &Path) -> Arc<dyn CredentialStore> {
    match config.store {
        StoreBackend::File => Arc::new(FileStore::new(cache_dir)),
        StoreBackend::Keyring => Arc::new(KeyringStore::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir)?;
    info!("OurSchool starting");

    let base_url = cli.api_url.unwrap_or_else(|| config.api_base_url());
    let api = ApiClient::new(&base_url)?;
    let store = credential_store(&config, &cache_dir);
    let controller = SessionController::new(
        config.session.to_session_config(),
        store,
        Arc::new(api.clone()),
        Arc::new(SystemClock),
    );

    let result = match cli.command.unwrap_or(Command::Watch) {
        Command::Login { token } => commands::login(&controller, &api, &mut config, &token).await,
        Command::Status => commands::status(&controller),
        Command::Logout => commands::logout(&controller),
        Command::Extend => commands::extend(&controller).await,
        Command::Watch => watch(controller).await,
    };

    info!("OurSchool shutting down");
    result
}

async fn watch(controller: SessionController) -> Result<()> {
    if !controller.restore() {
        anyhow::bail!("No active session. Run `ourschool login --token <TOKEN>` first.");
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(controller);
    let result = ui::run_app(&mut terminal, &mut app).await;
    let farewell = app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(message) = farewell {
        println!("{}", message);
    }
    result
}
