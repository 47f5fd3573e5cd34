//! shortpix - short-link image proxy daemon
//!
//! Resolves short codes and native Telegram file identifiers to file
//! locations, applies allow/block/moderation policy, and streams the bytes
//! back. Unrecognised paths are forwarded to the legacy host.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod kv;
pub mod moderation;
pub mod policy;
pub mod proxy;
pub mod resolver;
pub mod shortcode;
pub mod telegram;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::Config;
use db::Database;
use kv::KvStore;

/// The shortpix server instance
pub struct Server {
    config: Config,
    state: api::AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = if config.kv_enabled {
            Some(Arc::new(Database::new(config.db_path.as_deref()).await?))
        } else {
            warn!("Metadata store disabled, short codes will not resolve");
            None
        };

        if config.telegram.bot_token.is_empty() {
            warn!("No Telegram bot token configured");
        }

        let state = api::AppState::new(config.clone(), db)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the metadata store handle
    pub fn store(&self) -> Option<Arc<dyn KvStore>> {
        self.state.store.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("shortpix listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("shortpix shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
