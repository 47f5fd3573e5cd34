//! Identifier extraction
//!
//! Classifies an inbound request path as a short code, a native Telegram
//! file identifier, or a legacy path forwarded untouched.

/// Stems longer than this are native Telegram file identifiers
pub const LONG_ID_THRESHOLD: usize = 39;

/// A resource as addressed by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKey {
    /// Short code taken verbatim from the route
    ShortCode(String),
    /// Native identifier, extension already removed
    Native(String),
    /// Path and query forwarded to the legacy host
    Passthrough(String),
}

impl FileKey {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            FileKey::ShortCode(_) => "short",
            FileKey::Native(_) => "native",
            FileKey::Passthrough(_) => "passthrough",
        }
    }
}

/// Everything before the first `.`
pub fn strip_extension(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Check if a path segment names a native identifier
pub fn is_native_identifier(segment: &str) -> bool {
    strip_extension(segment).len() > LONG_ID_THRESHOLD
}

/// Derive the file key for a request
pub fn extract(path: &str, query: Option<&str>, route_param: Option<&str>) -> FileKey {
    if let Some(code) = route_param {
        return FileKey::ShortCode(code.to_string());
    }

    let segment = path.rsplit('/').next().unwrap_or("");
    if is_native_identifier(segment) {
        return FileKey::Native(strip_extension(segment).to_string());
    }

    match query {
        Some(q) => FileKey::Passthrough(format!("{}?{}", path, q)),
        None => FileKey::Passthrough(path.to_string()),
    }
}
