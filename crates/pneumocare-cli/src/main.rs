//! pneumocare - command-line client for the pneumocare service.
//!
//! Logs in against the backend, keeps the session alive across runs, and
//! sends chest X-ray images for prediction or questions to the RAG chat.

mod commands;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pneumocare_core::Config;

#[derive(Debug, Parser)]
#[command(name = "pneumocare", version, about = "Pneumonia prediction client")]
struct Cli {
    /// Backend base URL (overrides config and PNEUMOCARE_API_BASE_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create an account, then log in
    Register {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload a chest X-ray image for prediction
    Predict { image: PathBuf },
    /// Ask the medical assistant a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Keep the session renewed until interrupted
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file.and_then(open_log_file) {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn open_log_file(path: &Path) -> Option<std::fs::File> {
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = init_tracing(cli.log_file.as_deref());
    info!("pneumocare starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
    .with_env_overrides();
    if let Some(url) = cli.api_url {
        config.api_base_url = Some(url);
    }

    let result = commands::run(cli.command, config).await;

    info!("pneumocare shutting down");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::parse_from(["pneumocare", "ask", "what", "is", "pneumonia?"]);
        match cli.command {
            Command::Ask { query } => assert_eq!(query.join(" "), "what is pneumonia?"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_api_url_after_subcommand() {
        let cli = Cli::parse_from(["pneumocare", "status", "--json", "--api-url", "http://x.test"]);
        assert_eq!(cli.api_url.as_deref(), Some("http://x.test"));
        assert!(matches!(cli.command, Command::Status { json: true }));
    }
}
