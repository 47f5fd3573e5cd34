//! Content moderation client
//!
//! Rates a publicly fetchable image URL with the moderatecontent.com API.
//! The service is optional: without an API key nothing is ever rated.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Moderation API errors
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation API key not configured")]
    NotConfigured,

    /// Transport failure, with the URL (and so the API key) removed
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("moderation API returned HTTP {0}")]
    Status(StatusCode),
}

impl From<reqwest::Error> for ModerationError {
    fn from(e: reqwest::Error) -> Self {
        ModerationError::Request(e.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ModerateResponse {
    rating_label: Option<String>,
}

/// Moderation API client
#[derive(Debug, Clone)]
pub struct ModerationClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl ModerationClient {
    /// Create a new client
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModerationError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Rate the image at `image_url`
    ///
    /// Returns the rating label, or None when the API answered without one.
    pub async fn rate(&self, image_url: &str) -> Result<Option<String>, ModerationError> {
        let api_key = self.api_key.as_ref().ok_or(ModerationError::NotConfigured)?;

        debug!("Sending moderation request");

        let response = self
            .client
            .get(format!("{}/moderate/", self.base_url))
            .query(&[("key", api_key.as_str()), ("url", image_url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModerationError::Status(response.status()));
        }

        let body: ModerateResponse = response.json().await?;
        Ok(body.rating_label.filter(|l| !l.is_empty()))
    }
}
