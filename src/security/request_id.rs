use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info_span, Instrument};
use uuid::Uuid;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id attached to every request; echoed back in `x-request-id`.
#[derive(Debug, Clone)]
pub struct RequestId {
    pub id: String,
    pub sequence: u64,
}

impl RequestId {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst),
        }
    }

    pub fn as_header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.id).ok()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Reuses a well-formed incoming id (e.g. from a reverse proxy), otherwise
/// mints one, and runs the rest of the stack inside a `request` span.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = request
        .headers()
        .get(&header_name)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_valid_request_id(id))
        .map(RequestId::with_id)
        .unwrap_or_default();

    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id.id,
        method = %request.method(),
        path = %request.uri().path(),
        seq = request_id.sequence
    );

    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = request_id.as_header_value() {
        response.headers_mut().insert(header_name, value);
    }
    response
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn get_request_id<B>(request: &Request<B>) -> Option<&RequestId> {
    request.extensions().get::<RequestId>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_is_valid_request_id() {
        assert!(is_valid_request_id("abc-123_x.y"));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id(&"a".repeat(129)));
    }

    #[test]
    fn test_sequence_increments() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert!(b.sequence > a.sequence);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_incoming_id_is_echoed() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_id_middleware));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "proxy-42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "proxy-42");
    }
}
