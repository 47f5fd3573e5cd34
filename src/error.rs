//! API error type
//!
//! Every error leaves the service as a status code and a short plain-text
//! body; details only go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::resolver::ResolveError;
use crate::shortcode::ShortCodeError;
use crate::telegram::TelegramError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("upload not configured")]
    UploadNotConfigured,

    #[error("upload failed: {0}")]
    Upload(#[from] TelegramError),

    #[error("short code allocation failed: {0}")]
    ShortCode(#[from] ShortCodeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Resolve(e) => e.status_code(),
            Self::Upstream(_) | Self::Upload(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UploadNotConfigured | Self::ShortCode(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Body text shown to the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::Resolve(e) => e.to_string(),
            Self::Upstream(_) => "Bad gateway".to_string(),
            Self::BadRequest(msg) => msg.to_string(),
            Self::PayloadTooLarge => "Request body too large".to_string(),
            Self::UploadNotConfigured => "Upload not configured".to_string(),
            Self::Upload(_) => "Upload to Telegram failed".to_string(),
            Self::ShortCode(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        (status, self.public_message()).into_response()
    }
}
