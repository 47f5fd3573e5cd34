//! shortpix - short-link image proxy daemon

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shortpix::{Config, Server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Short-link image proxy for Telegram-hosted files
#[derive(Parser, Debug)]
#[command(name = "shortpix", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SHORTPIX_CONFIG", default_value = "shortpix.toml")]
    config: PathBuf,

    /// Address to listen on (overrides config)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// SQLite database file (overrides config; default is in-memory)
    #[arg(long)]
    database: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "SHORTPIX_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortpix=info,tower_http=debug".into()),
        )
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    info!("shortpix v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&args.config).context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.db_path = Some(database);
    }

    let server = Arc::new(Server::new(config).await?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
