//! File serving endpoints
//!
//! ANY /s/{code} - short code
//! ANY <other>   - native identifier or legacy passthrough

use axum::{
    body::to_bytes,
    extract::{Path, Request, State},
    http::header,
    response::Response,
};
use tracing::debug;

use super::{request_origin, AppState};
use crate::error::ApiError;
use crate::policy::{Decision, RequestContext};
use crate::proxy;
use crate::resolver::{extract, FileKey};

/// Serve a short code
pub async fn short_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    serve(state, Some(code), request).await
}

/// Serve any path that no other route claimed
pub async fn fallback(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    serve(state, None, request).await
}

async fn serve(
    state: AppState,
    route_param: Option<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let key = extract(parts.uri.path(), parts.uri.query(), route_param.as_deref());
    debug!(kind = key.kind(), path = %parts.uri.path(), "Resolving file");

    let target = state.resolver.resolve(&key).await?;

    let body = to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    let upstream = state
        .fetcher
        .fetch(parts.method.clone(), &parts.headers, body, &target.url)
        .await
        .map_err(ApiError::Upstream)?;

    // Failures are relayed as-is and never reach the gate
    if !upstream.status().is_success() {
        debug!("Upstream returned {} for {}", upstream.status(), key.kind());
        return Ok(proxy::verbatim(upstream));
    }

    let FileKey::ShortCode(code) = &key else {
        return Ok(if target.hosted {
            proxy::hosted(upstream, target.file_name.as_deref())
        } else {
            proxy::verbatim(upstream)
        });
    };

    let ctx = RequestContext {
        origin: request_origin(&state.config, &parts.headers),
        referer: parts
            .headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    };

    match state.gate.decide(code, &ctx).await {
        Decision::Serve => Ok(proxy::hosted(upstream, target.file_name.as_deref())),
        Decision::Redirect(location) => Ok(proxy::redirect(&location)),
    }
}
