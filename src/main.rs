mod bootstrap;
mod config;
mod dispatch;
mod export;
mod routes;
mod state;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use calbridge_core::CalendarClient;
use calbridge_google::{DEFAULT_API_BASE, GoogleCalendarApi};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dispatch::ToolDispatcher;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "calbridge", version)]
#[command(about = "Expose Google Calendar create/list/delete as JSON-RPC tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Print a token file as one-line JSON, for use as GOOGLE_TOKEN_JSON
    ExportToken {
        /// Token file to read (defaults to GOOGLE_TOKEN_PATH or token.json)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_logging(&config.log_level);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::ExportToken { path } => {
            export::run(path.as_deref().unwrap_or(&config.token_path))
        }
    }
}

/// `RUST_LOG` wins over `LOG_LEVEL`. Logs go to stderr so stdout stays clean
/// for `export-token`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(config: Config) -> Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("calbridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let manager = bootstrap::credential_manager(&config, http.clone())
        .context("Failed to load Google credentials")?;
    let api = GoogleCalendarApi::new(http, DEFAULT_API_BASE, config.calendar_id.clone())
        .context("Invalid Calendar API base URL")?;
    let dispatcher = ToolDispatcher::new(Arc::new(manager), CalendarClient::new(Arc::new(api)));

    let app = routes::app(AppState::new(dispatcher));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(calendar = %config.calendar_id, "calbridge listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
