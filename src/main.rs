//! CLI for wsrelay
//!
//! Runs the relay server until Ctrl-C. Settings come from the config file and
//! environment; the flags below override them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use wsrelay::config::{Settings, load_config_from};
use wsrelay::transport::start_websocket_server;
use wsrelay::utils::{RelayError, logging};

#[derive(Parser)]
#[command(name = "wsrelay", about = "Real-time WebSocket message relay")]
struct Args {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(long)]
    port: Option<u16>,

    /// Configuration file (defaults to config/default.* if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = if args.debug { "debug" } else { settings.log.level.as_str() };
    logging::init(level);

    if let Err(e) = run_server(settings).await {
        error!("Server failed: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn load_settings(args: &Args) -> Result<Settings, RelayError> {
    let mut settings = load_config_from(args.config.as_deref())?;
    if let Some(host) = &args.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    Ok(settings)
}

async fn run_server(settings: Settings) -> Result<(), RelayError> {
    info!(
        "Starting WebSocket relay on {}:{}",
        settings.server.host, settings.server.port
    );

    start_websocket_server(settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}
