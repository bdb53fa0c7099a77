use super::{config::AuthConfig, error::AuthError, types::AuthenticatedUser};
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::security::jwt::{extract_bearer_token, JwtManager};

#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub config: Arc<AuthConfig>,
    pub jwt: Arc<JwtManager>,
}

impl AuthMiddlewareState {
    pub fn new(config: Arc<AuthConfig>, jwt: Arc<JwtManager>) -> Self {
        Self { config, jwt }
    }
}

pub fn extract_user_from_request(
    request: &Request<Body>,
    jwt: &JwtManager,
) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = extract_bearer_token(auth_header).ok_or(AuthError::MissingToken)?;

    let claims = jwt.validate_access_token(token).map_err(|e| {
        debug!("Rejected bearer token: {e}");
        if e.to_string().contains("ExpiredSignature") {
            AuthError::ExpiredToken
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(AuthenticatedUser::from_claims(claims))
}

pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path().to_string();

    if state.config.is_anonymous_allowed(&path) {
        let user = extract_user_from_request(&request, &state.jwt)
            .unwrap_or_else(|_| AuthenticatedUser::anonymous());
        request.extensions_mut().insert(user);
        return Ok(next.run(request).await);
    }

    let user = extract_user_from_request(&request, &state.jwt)?;
    debug!("Authenticated {} ({}) for {}", user.id, user.role, path);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
