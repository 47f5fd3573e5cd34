//! Telegram Bot API client
//!
//! Provides:
//! - `getFile`: exchange a file id for a transient storage path
//! - File download URLs for a storage path
//! - `sendDocument`: upload bytes to the configured channel

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Telegram API errors
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport failure, with the URL (and so the bot token) removed
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API returned HTTP {0}")]
    Status(StatusCode),

    #[error("API error: {0}")]
    Api(String),

    #[error("chat id not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Request(e.without_url())
    }
}

/// Envelope around every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                self.description
                    .unwrap_or_else(|| "missing result".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    document: Option<Document>,
    animation: Option<Document>,
}

/// A document stored by Telegram
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: u64,
}

/// Telegram Bot API client
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: Option<String>,
}

impl TelegramClient {
    /// Create a new client
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Download URL for a storage path returned by `getFile`
    pub fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.bot_token,
            file_path.trim_start_matches('/')
        )
    }

    /// Resolve a file id to its storage path
    pub async fn get_file_path(&self, file_id: &str) -> Result<String, TelegramError> {
        debug!("Resolving Telegram file {}", file_id);

        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Telegram getFile error for {}: {}", file_id, status);
            return Err(TelegramError::Status(status));
        }

        let body: ApiResponse<FileInfo> = response.json().await?;
        body.into_result()?
            .file_path
            .ok_or_else(|| TelegramError::Api("file has no path".to_string()))
    }

    /// Upload bytes as a document to the configured chat
    pub async fn send_document(
        &self,
        data: Vec<u8>,
        file_name: &str,
    ) -> Result<Document, TelegramError> {
        let chat_id = self.chat_id.clone().ok_or(TelegramError::NotConfigured)?;

        debug!("Uploading {} ({} bytes) to Telegram", file_name, data.len());

        let form = Form::new()
            .text("chat_id", chat_id)
            .part("document", Part::bytes(data).file_name(file_name.to_string()));

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse<Message> = response.json().await.map_err(|e| {
            warn!(
                "Telegram sendDocument returned unreadable body ({}): {}",
                status,
                e.without_url()
            );
            TelegramError::Status(status)
        })?;

        let message = body.into_result()?;
        message
            .document
            .or(message.animation)
            .ok_or_else(|| TelegramError::Api("message has no document".to_string()))
    }
}
