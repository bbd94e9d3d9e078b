//! nap-audit - NAP listing audit service
//!
//! Compares business Name, Address and Phone records against the Google
//! Places API and writes a discrepancy report.
//!
//! Subcommands:
//! - `run`: one audit, for cron-style schedulers
//! - `serve`: HTTP trigger (`/audit/run`) plus health check
//! - `report`: summarize an existing audit report

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nap_common::config::{AppConfig, OutputConfig};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info};

use nap_audit::models::StatusCounts;
use nap_audit::services::{read_rows, PlacesClient};
use nap_audit::{build_router, trigger, AppState};

/// Command-line arguments for nap-audit
#[derive(Parser, Debug)]
#[command(name = "nap-audit")]
#[command(about = "Audit business NAP listings against the Google Places API")]
#[command(version)]
struct Args {
    /// TOML config file (default: NAP_CONFIG, then ~/.config/nap-audit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one audit and print the summary as JSON
    Run {
        /// Input file (overrides config and NAP_INPUT_PATH)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (overrides configured destination)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the HTTP trigger
    Serve {
        /// Socket address to bind (overrides config and NAP_BIND)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Summarize an existing audit report
    Report {
        /// Audit report CSV
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config loading logs before the configured subscriber exists
    let mut config = nap_common::logging::with_bootstrap_logging(|| {
        AppConfig::load(args.config.as_deref())
    })
    .context("Failed to load configuration")?;

    match &args.command {
        Command::Run { input, output } => {
            if let Some(input) = input {
                config.input.path = input.clone();
            }
            if let Some(output) = output {
                config.output = OutputConfig::File {
                    path: output.clone(),
                };
            }
        }
        Command::Serve { bind: Some(bind) } => config.server.bind = bind.clone(),
        _ => {}
    }

    nap_common::logging::init_logging(&config.logging)?;
    config.validate()?;

    info!(
        "nap-audit {} (build {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match args.command {
        Command::Run { .. } => run_once(config).await,
        Command::Serve { .. } => serve(config).await,
        Command::Report { path } => report(&path),
    }
}

async fn run_once(config: AppConfig) -> Result<()> {
    let places = PlacesClient::new(&config.lookup, config.api_key()?)
        .context("Failed to create Places client")?;

    let summary = trigger::execute(&config, &places)
        .await
        .context("Audit run failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let places = PlacesClient::new(&config.lookup, config.api_key()?)
        .context("Failed to create Places client")?;

    let bind = config.server.bind.clone();
    let app = build_router(AppState::new(config, places));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Trigger: GET http://{}/audit/run", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn report(path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open report {}", path.display()))?;
    let rows = read_rows(file)?;
    let counts = StatusCounts::from_rows(&rows);

    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
