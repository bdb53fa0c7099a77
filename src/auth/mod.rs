//! Login for both principal kinds: system users (by username) and
//! volunteers (by e-mail). Both receive the same bearer token shape.

use axum::{
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    routing::{get, post},
    Form, Json, Router,
};
use diesel::prelude::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audit::{record, AuditEntry};
use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::{users, volunteers};
use crate::core::shared::models::{User, Volunteer};
use crate::core::shared::state::AppState;
use crate::security::auth_api::{AuthError, AuthenticatedUser};
use crate::security::client_ip;

pub const TOKEN_TYPE: &str = "bearer";

/// Credentials from either a JSON body `{email, password}` or an
/// OAuth2-style form `username=..&password=..`.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub client_ip: Option<String>,
}

#[derive(Deserialize)]
struct JsonLogin {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct FormLogin {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[axum::async_trait]
impl<S> FromRequest<S> for LoginRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let client_ip = client_ip(req.headers(), req.extensions());
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let (email, password) = if is_form {
            let Form(form) = Form::<FormLogin>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            let login = form
                .username
                .or(form.email)
                .ok_or_else(|| ApiError::BadRequest("username is required".to_string()))?;
            (login, form.password)
        } else {
            let Json(body) = Json::<JsonLogin>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            (body.email, body.password)
        };

        Ok(Self {
            email: email.trim().to_string(),
            password,
            client_ip,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: Role,
    pub user_id: String,
    pub name: String,
    pub specialty: Option<String>,
}

enum Principal {
    User(User),
    Volunteer(Volunteer),
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    req: LoginRequest,
) -> ApiResult<Json<LoginResponse>> {
    let login = req.email.clone();
    let principal = state
        .db(move |conn| {
            let user = users::table
                .filter(users::username.eq(&login))
                .select(User::as_select())
                .first(conn)
                .optional()?;
            if let Some(user) = user {
                return Ok(Some(Principal::User(user)));
            }
            let volunteer = volunteers::table
                .filter(volunteers::email.eq(&login))
                .select(Volunteer::as_select())
                .first(conn)
                .optional()?;
            Ok(volunteer.map(Principal::Volunteer))
        })
        .await?;

    let Some(principal) = principal else {
        warn!("Login failed for unknown principal {}", req.email);
        return Err(AuthError::UserNotFound.into());
    };

    let (user_id, name, role, volunteer_id, specialty, hash, active) = match principal {
        Principal::User(user) => {
            let volunteer_id = match user.role {
                Role::Volunteer => user.volunteer_id.clone(),
                _ => None,
            };
            (user.id, user.name, user.role, volunteer_id, None, user.password, true)
        }
        Principal::Volunteer(v) => (
            v.id.clone(),
            v.name,
            Role::Volunteer,
            Some(v.id),
            Some(v.specialty),
            v.password,
            v.active,
        ),
    };

    if !state.verify_password(req.password, hash).await? {
        warn!("Login failed for {}: wrong password", req.email);
        return Err(AuthError::WrongPassword.into());
    }
    if !active {
        warn!("Login refused for inactive volunteer {user_id}");
        return Err(AuthError::AccountDisabled.into());
    }

    let access_token = state
        .jwt
        .issue(&user_id, role, &name, volunteer_id)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

    record(
        &state,
        AuditEntry::new(&user_id, &name, "LOGIN", "Auth")
            .with_resource_id(&user_id)
            .with_ip(req.client_ip),
    )
    .await;
    info!("{} logged in as {}", user_id, role);

    Ok(Json(LoginResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
        role,
        user_id,
        name,
        specialty,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
