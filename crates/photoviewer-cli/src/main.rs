//! PhotoViewer - a terminal client for a photo-sharing backend.
//!
//! Log in, browse the feed, upload new posts and edit or delete existing
//! ones. A stored login is reused only while this process is alive and the
//! app has not been idle for more than ten minutes.

mod shell;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use photoviewer_core::session::{ProcessSessionFlag, SystemClock};
use photoviewer_core::store::CredentialStore;
use photoviewer_core::{App, Config};

/// Directory for daily-rotated log files; unset means stderr only
const ENV_LOG_DIR: &str = "PHOTOVIEWER_LOG_DIR";

#[derive(Parser)]
#[command(name = "photoviewer", version, about = "Browse and manage photo posts")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive shell (default)
    Shell,
    /// Run the launch check and print the resulting session state
    Status,
    /// Erase everything in the credential store
    Reset,
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must live as long as file logging is wanted.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "photoviewer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let keys = config.key_provider()?;

    if let Some(Command::Reset) = cli.command {
        let store = CredentialStore::open(&config.data_dir()?, keys.as_ref())?;
        store.clear_all()?;
        println!("Credential store cleared.");
        return Ok(());
    }

    info!("PhotoViewer starting");

    // The session check inside launch must finish before any screen is chosen.
    let mut app = App::launch(
        config,
        keys.as_ref(),
        Arc::new(ProcessSessionFlag::new()),
        Arc::new(SystemClock),
    )?;

    match cli.command {
        Some(Command::Status) => {
            println!("Session check: {:?}", app.verdict());
            println!("Start screen:  {:?}", app.route());
        }
        _ => shell::run(&mut app).await?,
    }

    info!("PhotoViewer shutting down");
    Ok(())
}
