use crate::error::ServerError;
use crate::state::{RateLimit, ServerState};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Correlation id, taken from the caller or generated.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The key a request was authenticated with.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

/// `X-API-Key: k` or `Authorization: Bearer k`.
fn api_key_from(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Rejects `/api/v1` requests without a known key or over the key's budget.
pub async fn api_key_auth(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(key) = api_key_from(request.headers()).map(str::to_string) else {
        metrics::counter!("hrag_auth_failures_total", "reason" => "missing").increment(1);
        return Err(ServerError::Authentication(
            "API key required in 'X-API-Key' or 'Authorization: Bearer <key>'".to_string(),
        ));
    };

    if !state.is_valid_api_key(&key) {
        metrics::counter!("hrag_auth_failures_total", "reason" => "invalid").increment(1);
        return Err(ServerError::Authentication("Invalid API key".to_string()));
    }

    let remaining = match state.check_rate_limit(&key) {
        RateLimit::Allowed { remaining } => remaining,
        RateLimit::Exceeded => {
            tracing::debug!("rate limit exceeded");
            return Err(ServerError::RateLimitExceeded);
        }
    };

    request.extensions_mut().insert(ApiKey(key));
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
    Ok(response)
}

/// Attach a [`RequestId`] to the request and echo it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// One span per request; status and latency on completion.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let span = tracing::info_span!("request", method = %method, path = %path, request_id = %id);
    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = start.elapsed();
    let status = response.status();

    metrics::counter!(
        "hrag_http_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!("hrag_http_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());

    span.in_scope(|| {
        tracing::info!(
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        );
    });
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_header_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer second"));
        assert_eq!(api_key_from(&headers), Some("second"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("first"));
        assert_eq!(api_key_from(&headers), Some("first"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(api_key_from(&headers), None);
    }
}
