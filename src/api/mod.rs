//! HTTP API module - file routes, upload, and service endpoints

mod file;
mod pages;
mod upload;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;
use crate::kv::{KvStore, SqliteKvStore};
use crate::moderation::ModerationClient;
use crate::policy::PolicyGate;
use crate::proxy::UpstreamFetcher;
use crate::resolver::Resolver;
use crate::telegram::TelegramClient;

pub use upload::UploadResponse;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Option<Arc<Database>>,
    pub store: Option<Arc<dyn KvStore>>,
    pub resolver: Arc<Resolver>,
    pub gate: Arc<PolicyGate>,
    pub fetcher: Arc<UpstreamFetcher>,
    pub telegram: Arc<TelegramClient>,
}

impl AppState {
    /// Wire up clients, store, resolver and gate from configuration
    pub fn new(config: Config, db: Option<Arc<Database>>) -> Result<Self> {
        let store: Option<Arc<dyn KvStore>> = db
            .as_ref()
            .map(|db| Arc::new(SqliteKvStore::new(db.pool().clone())) as Arc<dyn KvStore>);
        Self::with_store(config, db, store)
    }

    /// Same as [`AppState::new`] with an explicit store
    pub fn with_store(
        config: Config,
        db: Option<Arc<Database>>,
        store: Option<Arc<dyn KvStore>>,
    ) -> Result<Self> {
        let timeout = config.request_timeout();

        let telegram = Arc::new(TelegramClient::new(
            &config.telegram.api_base,
            &config.telegram.bot_token,
            config.telegram.chat_id.clone(),
            timeout,
        )?);
        let moderation = Arc::new(ModerationClient::new(
            &config.moderation.api_base,
            config.moderation.api_key.clone(),
            timeout,
        )?);

        let resolver = Arc::new(Resolver::new(
            store.clone(),
            telegram.clone(),
            &config.legacy_origin,
        ));
        let gate = Arc::new(PolicyGate::new(
            store.clone(),
            moderation,
            config.policy.clone(),
        ));
        let fetcher = Arc::new(UpstreamFetcher::new(timeout)?);

        Ok(Self {
            config: Arc::new(config),
            db,
            store,
            resolver,
            gate,
            fetcher,
            telegram,
        })
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD]);

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/upload", post(upload::upload))
        .route("/s/{code}", any(file::short_code))
        .route(crate::policy::BLOCK_PAGE, get(pages::blocked))
        .route(crate::policy::WHITELIST_PAGE, get(pages::whitelist_on))
        .fallback(file::fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `scheme://host[:port]` of this service as the caller addressed it
pub fn request_origin(config: &Config, headers: &HeaderMap) -> String {
    if let Some(origin) = &config.public_origin {
        return origin.trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    format!("{}://{}", scheme, host)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "shortpix",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let Some(db) = &state.db else {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "disabled",
            }),
        );
    };

    match db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}
