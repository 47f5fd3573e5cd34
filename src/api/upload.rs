//! Upload endpoint
//!
//! POST /upload - multipart `file` field, stored in Telegram, returns a short link

use std::sync::LazyLock;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderMap,
    Json,
};
use regex::Regex;
use serde::Serialize;
use tracing::info;

use super::{request_origin, AppState};
use crate::error::ApiError;
use crate::kv::{save_record, FileRecord};
use crate::shortcode;

static IMAGE_EXT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpe?g|png|gif|webp)$").unwrap());

/// Upload result
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub code: String,
    pub url: String,
    pub file_id: String,
}

/// Image extension of an uploaded file name, including the dot
pub fn image_extension(file_name: &str) -> &str {
    IMAGE_EXT_REGEX
        .find(file_name)
        .map(|m| m.as_str())
        .unwrap_or("")
}

/// Store an uploaded file and allocate its short code
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::BadRequest("Expected multipart/form-data"))?;

    if !state.config.uploads_enabled() {
        return Err(ApiError::UploadNotConfigured);
    }
    let store = state.store.as_deref().ok_or(ApiError::UploadNotConfigured)?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Malformed multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::BadRequest("Malformed multipart body"))?;
        file = Some((name, data));
        break;
    }

    let (file_name, data) = file.ok_or(ApiError::BadRequest("Missing file upload"))?;
    let size = data.len() as u64;

    let document = state.telegram.send_document(data.to_vec(), &file_name).await?;
    let code = shortcode::allocate(store).await?;

    let file_size = if document.file_size > 0 {
        document.file_size
    } else {
        size
    };
    let record = FileRecord::new(
        Some(format!("{}{}", document.file_id, image_extension(&file_name))),
        file_size,
    );
    save_record(store, &code, &record)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Uploaded {} as short code {}", file_name, code);

    Ok(Json(UploadResponse {
        url: format!("{}/s/{}", request_origin(&state.config, &headers), code),
        code,
        file_id: document.file_id,
    }))
}
