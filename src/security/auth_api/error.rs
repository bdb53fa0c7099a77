use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("insufficient permissions")]
    InsufficientPermissions,
    #[error("user not found")]
    UserNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("account disabled")]
    AccountDisabled,
    #[error("rate limited")]
    RateLimited,
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::ExpiredToken => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::WrongPassword => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::UserNotFound => "user_not_found",
            Self::WrongPassword => "wrong_password",
            Self::AccountDisabled => "account_disabled",
            Self::RateLimited => "rate_limited",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingToken => "Could not validate credentials".to_string(),
            Self::InvalidToken => "Could not validate credentials".to_string(),
            Self::ExpiredToken => "Token expirado".to_string(),
            Self::InsufficientPermissions => "Acesso negado".to_string(),
            Self::UserNotFound => "Usuário não encontrado".to_string(),
            Self::WrongPassword => "Senha incorreta".to_string(),
            Self::AccountDisabled => "Conta desativada".to_string(),
            Self::RateLimited => "Rate limit exceeded. Try again later.".to_string(),
            Self::InternalError(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::InternalError(detail) = &self {
            log::error!("Authentication internal error: {detail}");
        }
        let status = self.status_code();
        let body = Json(json!({
            "error": self.message(),
            "code": self.error_code()
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
