use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::service::{record, AuditEntry};
use crate::core::shared::state::AppState;
use crate::security::auth_api::AuthenticatedUser;
use crate::security::client_ip;

pub const API_PREFIX: &str = "/api/v1";

/// Whether a request to `path` with `method` leaves an access trail.
///
/// Financial and medical-record paths are logged for every verb; patient and
/// volunteer reads are logged too, since their writes already log themselves.
pub fn should_audit(method: &Method, path: &str) -> bool {
    let tracked_verb = matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    );
    if !tracked_verb {
        return false;
    }
    if path.contains("/financial") || path.contains("/medical-records") {
        return true;
    }
    *method == Method::GET && (path.contains("/patients") || path.contains("/volunteers"))
}

/// Splits `/api/v1/<resource>/<id>/...` into `(resource, id)`.
pub fn resource_of(path: &str) -> (String, Option<String>) {
    let rest = path.strip_prefix(API_PREFIX).unwrap_or(path);
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let resource = segments.next().unwrap_or("unknown").to_string();
    let id = segments.next().map(str::to_string);
    (resource, id)
}

pub async fn audit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .filter(|u| u.is_authenticated())
        .cloned();
    let ip = client_ip(request.headers(), request.extensions());

    let response = next.run(request).await;

    let status = response.status();
    if status == StatusCode::TEMPORARY_REDIRECT || status == StatusCode::PERMANENT_REDIRECT {
        return response;
    }

    if let Some(user) = user {
        if should_audit(&method, &path) {
            let (resource, resource_id) = resource_of(&path);
            let mut entry = AuditEntry::by(&user, method.as_str(), &resource)
                .with_details(format!("Path: {path} | Status: {}", status.as_u16()))
                .with_ip(ip);
            if let Some(id) = resource_id {
                entry = entry.with_resource_id(id);
            }
            record(&state, entry).await;
        }
    }

    response
}
