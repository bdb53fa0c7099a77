use log::warn;
use sha2::{Digest, Sha256};

const DEV_JWT_SECRET: &str = "clinica-social-dev-secret-change-me-in-production";

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitSettings,
    pub backup: BackupConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub encryption_key: [u8; 32],
}

#[derive(Clone, Debug)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
    pub login_per_minute: u32,
}

#[derive(Clone, Debug)]
pub struct BackupConfig {
    pub dir: String,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("encryption_key", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("security", &self.security)
            .field("rate_limit", &self.rate_limit)
            .field("backup", &self.backup)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_str = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let get_num = |key: &str, default: u32| -> u32 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let port = get_str("PORT", "8000")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("Invalid PORT: {e}"))?;

        let cors_origins = get_str(
            "BACKEND_CORS_ORIGINS",
            "http://localhost:3000,http://localhost:8000",
        )
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        let url = get_str("DATABASE_URL", "clinica.db");
        let url = url
            .strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(&url)
            .to_string();

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let encryption_key = match lookup("ENCRYPTION_KEY").filter(|s| !s.is_empty()) {
            Some(hex_key) => parse_key(&hex_key)?,
            None => {
                warn!("ENCRYPTION_KEY not set, deriving field key from JWT secret");
                derive_key(&jwt_secret)
            }
        };

        let bootstrap_admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            _ => None,
        };

        Ok(AppConfig {
            server: ServerConfig {
                host: get_str("HOST", "0.0.0.0"),
                port,
                cors_origins,
            },
            database: DatabaseConfig {
                url,
                pool_size: get_num("DATABASE_POOL_SIZE", 10).max(1),
            },
            security: SecurityConfig {
                jwt_secret,
                jwt_expiration_hours: i64::from(get_num("JWT_EXPIRATION_HOURS", 24).max(1)),
                encryption_key,
            },
            rate_limit: RateLimitSettings {
                requests_per_minute: get_num("RATE_LIMIT_PER_MINUTE", 100),
                login_per_minute: get_num("LOGIN_RATE_LIMIT_PER_MINUTE", 5),
            },
            backup: BackupConfig {
                dir: get_str("BACKUP_DIR", "backups"),
            },
            bootstrap_admin,
        })
    }
}

fn parse_key(hex_key: &str) -> Result<[u8; 32], anyhow::Error> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| anyhow::anyhow!("ENCRYPTION_KEY must be hex: {e}"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be 32 bytes (64 hex chars)"))
}

fn derive_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"clinica-field-key:");
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).expect("defaults");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.url, "clinica.db");
        assert_eq!(config.security.jwt_expiration_hours, 24);
        assert_eq!(config.rate_limit.login_per_minute, 5);
        assert_eq!(config.server.cors_origins.len(), 2);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_sqlite_prefix_is_stripped() {
        let config = config_from(&[("DATABASE_URL", "sqlite:///./clinica.db")]).expect("config");
        assert_eq!(config.database.url, "./clinica.db");

        let config = config_from(&[("DATABASE_URL", "sqlite:////tmp/clinic.db")]).expect("config");
        assert_eq!(config.database.url, "/tmp/clinic.db");
    }

    #[test]
    fn test_encryption_key_must_be_32_bytes() {
        assert!(config_from(&[("ENCRYPTION_KEY", "abcd")]).is_err());
        let key = "11".repeat(32);
        let config = config_from(&[("ENCRYPTION_KEY", key.as_str())]).expect("config");
        assert_eq!(config.security.encryption_key, [0x11u8; 32]);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(config_from(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[("JWT_SECRET", "super-secret-value-for-tests-only")])
            .expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
