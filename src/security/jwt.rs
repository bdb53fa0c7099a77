use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::shared::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "clinica-social".into(),
            audience: "clinica-social-api".into(),
            access_token_expiry_minutes: 24 * 60,
            leeway_seconds: 60,
        }
    }
}

impl JwtConfig {
    pub fn with_expiry_hours(mut self, hours: i64) -> Self {
        self.access_token_expiry_minutes = hours * 60;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<String>,
}

impl Claims {
    pub fn new(
        subject: &str,
        role: Role,
        name: &str,
        issuer: &str,
        audience: &str,
        expiry: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role,
            name: name.to_string(),
            volunteer_id: None,
        }
    }

    pub fn with_volunteer_id(mut self, volunteer_id: String) -> Self {
        self.volunteer_id = Some(volunteer_id);
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters"));
        }
        Ok(Self {
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn from_secret(secret: &str) -> Result<Self> {
        Self::new(JwtConfig::default(), secret)
    }

    pub fn issue(
        &self,
        subject: &str,
        role: Role,
        name: &str,
        volunteer_id: Option<String>,
    ) -> Result<String> {
        let expiry = Utc::now() + Duration::minutes(self.config.access_token_expiry_minutes);
        let mut claims = Claims::new(
            subject,
            role,
            name,
            &self.config.issuer,
            &self.config.audience,
            expiry,
        );
        if let Some(id) = volunteer_id {
            claims = claims.with_volunteer_id(id);
        }
        let token = self.generate_access_token(&claims)?;
        debug!("Issued access token {} for {subject}", claims.jti);
        Ok(token)
    }

    pub fn generate_access_token(&self, claims: &Claims) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode access token: {e}"))
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.leeway = self.config.leeway_seconds;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        Ok(self.validate_token(token)?.claims)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::from_secret("test-secret-key-that-is-at-least-32-characters-long")
            .expect("Failed to create manager")
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtManager::from_secret("short").is_err());
    }

    #[test]
    fn test_issue_and_validate() {
        let manager = create_test_manager();
        let token = manager
            .issue("user-1", Role::Staff, "Recepção", None)
            .expect("Failed to issue");

        let claims = manager
            .validate_access_token(&token)
            .expect("Validation failed");

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.name, "Recepção");
        assert!(claims.volunteer_id.is_none());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_volunteer_claim() {
        let manager = create_test_manager();
        let token = manager
            .issue("vol-1", Role::Volunteer, "Dra. Ana", Some("vol-1".into()))
            .expect("Failed to issue");
        let claims = manager.validate_access_token(&token).expect("Validation failed");
        assert_eq!(claims.volunteer_id.as_deref(), Some("vol-1"));
    }

    #[test]
    fn test_invalid_token() {
        let manager = create_test_manager();
        assert!(manager.validate_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::from_secret("another-secret-key-that-is-also-32-chars-long")
            .expect("Failed to create manager");
        let token = other
            .issue("user-1", Role::Admin, "Admin", None)
            .expect("Failed to issue");
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = create_test_manager();
        let claims = Claims::new(
            "user-1",
            Role::Admin,
            "Admin",
            "clinica-social",
            "clinica-social-api",
            Utc::now() - Duration::hours(2),
        );
        let token = manager.generate_access_token(&claims).expect("Failed to encode");
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }
}
