//! Upstream byte fetch and response shaping

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use tracing::debug;

/// Cache policy for hosted files; a file id never changes its bytes
pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards inbound requests to their resolved upstream
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
}

impl UpstreamFetcher {
    /// Create a new fetcher
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Single fetch with the inbound method, headers and body
    ///
    /// Errors carry no URL; Telegram download URLs embed the bot token.
    pub async fn fetch(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        url: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let response = self
            .client
            .request(method, url)
            .headers(forwardable_headers(headers))
            .body(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        debug!("Upstream responded {}", response.status());
        Ok(response)
    }
}

/// Inbound headers minus those that describe the inbound connection
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    forwarded.remove(header::HOST);
    forwarded.remove(header::CONTENT_LENGTH);
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded
}

/// Relay an upstream response unchanged, streaming its body
pub fn verbatim(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Relay a hosted file with image-friendly headers
pub fn hosted(upstream: reqwest::Response, file_name: Option<&str>) -> Response {
    let upstream_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = verbatim(upstream);
    let headers = response.headers_mut();

    if let Some(content_type) = normalize_content_type(upstream_type.as_deref(), file_name) {
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));

    response
}

/// 302 to `location`
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect").into_response(),
    }
}

/// Content type for a file extension
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let name = file_name.rsplit('/').next().unwrap_or(file_name);
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" => Some("video/mp4"),
        _ => None,
    }
}

/// Drop charset parameters and replace generic types with one from the name
pub fn normalize_content_type(upstream: Option<&str>, file_name: Option<&str>) -> Option<String> {
    let essence = upstream
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty());

    let guessed = file_name.and_then(content_type_for);

    match (essence, guessed) {
        (None, guess) | (Some("application/octet-stream"), guess @ Some(_)) => {
            guess.map(str::to_string)
        }
        (Some(ct), _) => Some(ct.to_string()),
    }
}
