//! Location resolution
//!
//! Turns a [`FileKey`] into the upstream URL its bytes are fetched from:
//! - short codes go through the metadata store, then Telegram `getFile`
//! - native identifiers go straight to `getFile`
//! - anything else is forwarded to the legacy host

mod key;

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::kv::{load_record, KvError, KvStore};
use crate::telegram::{TelegramClient, TelegramError};

pub use key::{extract, is_native_identifier, strip_extension, FileKey, LONG_ID_THRESHOLD};

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("File not found in KV")]
    NotInStore,

    #[error("File not found in Telegram.")]
    NotInTelegram(#[source] TelegramError),

    #[error("Failed to resolve file path")]
    ResolutionFailed(#[source] TelegramError),

    #[error("Metadata store error")]
    Store(#[from] KvError),
}

impl ResolveError {
    /// HTTP status reported to the caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::NotInStore | ResolveError::NotInTelegram(_) => StatusCode::NOT_FOUND,
            ResolveError::ResolutionFailed(_) | ResolveError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Where to fetch a file from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    /// Stored or requested file name, used to pick a content type
    pub file_name: Option<String>,
    /// Hosted files get image response headers; legacy responses pass verbatim
    pub hosted: bool,
}

/// Resolves file keys to upstream locations
pub struct Resolver {
    store: Option<Arc<dyn KvStore>>,
    telegram: Arc<TelegramClient>,
    legacy_origin: String,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(
        store: Option<Arc<dyn KvStore>>,
        telegram: Arc<TelegramClient>,
        legacy_origin: &str,
    ) -> Self {
        Self {
            store,
            telegram,
            legacy_origin: legacy_origin.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a key to its upstream target
    pub async fn resolve(&self, key: &FileKey) -> Result<Target, ResolveError> {
        match key {
            FileKey::ShortCode(code) => self.resolve_short_code(code).await,
            FileKey::Native(id) => {
                let file_path = self
                    .telegram
                    .get_file_path(id)
                    .await
                    .map_err(ResolveError::ResolutionFailed)?;
                Ok(Target {
                    url: self.telegram.file_url(&file_path),
                    file_name: Some(file_path),
                    hosted: true,
                })
            }
            FileKey::Passthrough(path_and_query) => Ok(Target {
                url: format!("{}{}", self.legacy_origin, path_and_query),
                file_name: None,
                hosted: false,
            }),
        }
    }

    async fn resolve_short_code(&self, code: &str) -> Result<Target, ResolveError> {
        let Some(store) = self.store.as_deref() else {
            debug!("No metadata store, short code {} unresolvable", code);
            return Err(ResolveError::NotInStore);
        };

        let file_name = load_record(store, code)
            .await?
            .and_then(|record| record.file_name)
            .ok_or(ResolveError::NotInStore)?;

        let file_id = strip_extension(&file_name);
        let file_path = self.telegram.get_file_path(file_id).await.map_err(|e| {
            warn!("Short code {} points at unresolvable file: {}", code, e);
            ResolveError::NotInTelegram(e)
        })?;

        Ok(Target {
            url: self.telegram.file_url(&file_path),
            file_name: Some(file_name),
            hosted: true,
        })
    }
}
