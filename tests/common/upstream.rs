//! Mock upstream standing in for Telegram, the moderation API and the
//! legacy host, with per-endpoint call counters.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const BOT_TOKEN: &str = "test-token";
pub const CHAT_ID: &str = "-100200300";

/// Resolves to documents/file_1.jpg
pub const NATIVE_ID: &str = "BQACAgEAAxkBAAIBZ2Zq4vLongNativeIdentifier01";
/// Resolves to documents/adult_2.jpg
pub const ADULT_ID: &str = "BQACAgEAAxkBAAIBZ2Zq4vAdultImageIdentifier02";
/// 45 characters, resolves to photos/file_3.jpg
pub const LONG_PATH_ID: &str = "AgACAgEAAxkBAAIBZ2Zq4vPhotoIdentifierOf45Char";
/// Returned by sendDocument, resolves to documents/file_4.png
pub const UPLOAD_ID: &str = "BQACAgEAAxkBAAIBZ2Zq4vUploadedDocumentIdent04";
/// Resolves to documents/broken_5.jpg
pub const BROKEN_ID: &str = "BQACAgEAAxkBAAIBZ2Zq4vBrokenModerationIdent05";
/// Resolves to a path whose download 404s
pub const GONE_ID: &str = "BQACAgEAAxkBAAIBZ2Zq4vGoneFromStorageIdentif06";

pub const FILE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg-bytes";

/// Call counters, plus what the download and moderation endpoints saw
#[derive(Default)]
pub struct Calls {
    pub get_file: AtomicUsize,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub moderation: AtomicUsize,
    pub legacy: AtomicUsize,
    pub downloaded_paths: Mutex<Vec<String>>,
    pub moderated_urls: Mutex<Vec<String>>,
}

impl Calls {
    pub fn get_file(&self) -> usize {
        self.get_file.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn moderation(&self) -> usize {
        self.moderation.load(Ordering::SeqCst)
    }

    pub fn legacy(&self) -> usize {
        self.legacy.load(Ordering::SeqCst)
    }

    pub fn downloaded_paths(&self) -> Vec<String> {
        self.downloaded_paths.lock().clone()
    }

    /// Every URL the moderation endpoint was asked to rate
    pub fn moderated_urls(&self) -> Vec<String> {
        self.moderated_urls.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.get_file() + self.downloads() + self.uploads() + self.moderation() + self.legacy()
    }
}

/// Running mock server
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub calls: Arc<Calls>,
    _handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        let calls = Arc::new(Calls::default());

        let app = Router::new()
            .route(&format!("/bot{}/getFile", BOT_TOKEN), get(get_file))
            .route(&format!("/bot{}/sendDocument", BOT_TOKEN), post(send_document))
            .route(&format!("/file/bot{}/{{*path}}", BOT_TOKEN), get(download))
            .route("/moderate/", get(moderate))
            .fallback(legacy)
            .with_state(calls.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            calls,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

fn file_path_for(file_id: &str) -> Option<&'static str> {
    match file_id {
        NATIVE_ID => Some("documents/file_1.jpg"),
        ADULT_ID => Some("documents/adult_2.jpg"),
        LONG_PATH_ID => Some("photos/file_3.jpg"),
        UPLOAD_ID => Some("documents/file_4.png"),
        BROKEN_ID => Some("documents/broken_5.jpg"),
        GONE_ID => Some("documents/missing.jpg"),
        _ => None,
    }
}

async fn get_file(
    State(calls): State<Arc<Calls>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    calls.get_file.fetch_add(1, Ordering::SeqCst);

    let file_id = params.get("file_id").cloned().unwrap_or_default();
    match file_path_for(&file_id) {
        Some(path) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "result": { "file_id": file_id, "file_size": FILE_BYTES.len(), "file_path": path }
            })),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: invalid file_id"
            })),
        ),
    }
}

async fn download(State(calls): State<Arc<Calls>>, Path(path): Path<String>) -> impl IntoResponse {
    calls.downloads.fetch_add(1, Ordering::SeqCst);
    calls.downloaded_paths.lock().push(path.clone());

    if path.contains("missing") {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        FILE_BYTES,
    )
        .into_response()
}

async fn send_document(State(calls): State<Arc<Calls>>, mut multipart: Multipart) -> impl IntoResponse {
    calls.uploads.fetch_add(1, Ordering::SeqCst);

    let mut chat_id = None;
    let mut file_name = None;
    let mut size = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("chat_id") => chat_id = field.text().await.ok(),
            Some("document") => {
                file_name = field.file_name().map(str::to_string);
                size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            _ => {}
        }
    }

    if chat_id.as_deref() != Some(CHAT_ID) {
        return Json(json!({ "ok": false, "description": "Bad Request: chat not found" }));
    }

    Json(json!({
        "ok": true,
        "result": {
            "message_id": 42,
            "document": { "file_id": UPLOAD_ID, "file_name": file_name, "file_size": size }
        }
    }))
}

/// Rates like the real service: fetch the image, label it by its URL
async fn moderate(
    State(calls): State<Arc<Calls>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    calls.moderation.fetch_add(1, Ordering::SeqCst);

    let url = params.get("url").cloned().unwrap_or_default();
    calls.moderated_urls.lock().push(url.clone());

    if url.contains("broken") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "moderation backend down").into_response();
    }

    let fetched = match reqwest::get(&url).await {
        Ok(response) => response.status().is_success() && response.bytes().await.is_ok(),
        Err(_) => false,
    };
    if !fetched {
        return Json(json!({ "url": url, "error_code": 1002, "error": "image not reachable" }))
            .into_response();
    }

    let label = if url.contains("adult") { "adult" } else { "everyone" };
    Json(json!({ "url": url, "rating_label": label, "error_code": 0 })).into_response()
}

async fn legacy(State(calls): State<Arc<Calls>>, request: Request) -> impl IntoResponse {
    calls.legacy.fetch_add(1, Ordering::SeqCst);

    let uri = request.uri().to_string();
    if uri.contains("/missing") {
        return (StatusCode::NOT_FOUND, "gone").into_response();
    }
    (StatusCode::OK, format!("legacy:{}", uri)).into_response()
}
