pub mod auth_api;
pub mod cors;
pub mod encryption;
pub mod headers;
pub mod jwt;
pub mod password;
pub mod rate_limiter;
pub mod request_id;

pub use auth_api::{auth_middleware, AuthConfig, AuthError, AuthMiddlewareState, AuthenticatedUser};
pub use cors::{create_cors_layer_with_origins, CorsConfig};
pub use encryption::{decrypt_field, encrypt_field, is_encrypted, FieldCipher};
pub use headers::{create_security_headers_layer, security_headers_middleware, SecurityHeadersConfig};
pub use jwt::{extract_bearer_token, Claims, JwtConfig, JwtManager};
pub use password::{hash_password, verify_password, Argon2Config, PasswordHasher2};
pub use rate_limiter::{
    client_ip, create_rate_limit_layer, peer_ip, rate_limit_middleware, ClinicRateLimiter,
    HttpRateLimitConfig,
};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
