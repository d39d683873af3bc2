//! Vellum HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use vellum_core::{LogFormat, init_observability, init_tracing};
use vellum_server::{EngineSettings, build_in_memory, build_postgres, create_router};

#[derive(Parser, Debug)]
#[command(name = "vellum-server")]
#[command(about = "Multi-model proposal generation server", version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vellum.toml")]
    config: PathBuf,

    /// Address to bind, overrides the configuration file
    #[arg(short, long)]
    bind: Option<String>,

    /// Database URL; versions are kept in memory when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut settings = EngineSettings::load(Some(&args.config))
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        settings.set_bind(bind);
    }
    if args.database_url.is_some() {
        settings.set_database_url(args.database_url);
    }

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        *settings.server().log_format()
    };
    init_tracing(format).map_err(anyhow::Error::msg)?;
    let metrics = init_observability("vellum-server", Duration::from_secs(60))
        .map_err(anyhow::Error::msg)?;

    info!(config = %args.config.display(), "Starting Vellum server");

    let state = match settings.database().url() {
        Some(url) => build_postgres(&settings, url).await?,
        None => {
            warn!("No database configured, versions are kept in memory");
            build_in_memory(&settings).await?.0
        }
    };

    let listener = tokio::net::TcpListener::bind(settings.server().bind())
        .await
        .with_context(|| format!("Failed to bind {}", settings.server().bind()))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        })
        .await?;

    metrics.shutdown();
    Ok(())
}
