use crate::backup::BackupService;
use crate::core::config::AppConfig;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::utils::DbPool;
use crate::security::encryption::FieldCipher;
use crate::security::jwt::{JwtConfig, JwtManager};
use crate::security::password::PasswordHasher2;
use diesel::SqliteConnection;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub jwt: Arc<JwtManager>,
    pub cipher: FieldCipher,
    pub passwords: Arc<PasswordHasher2>,
    pub backup: Arc<BackupService>,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Result<Self, anyhow::Error> {
        let jwt_config =
            JwtConfig::default().with_expiry_hours(config.security.jwt_expiration_hours);
        let jwt = Arc::new(JwtManager::new(jwt_config, &config.security.jwt_secret)?);
        let cipher = FieldCipher::new(config.security.encryption_key);
        let passwords = Arc::new(PasswordHasher2::with_defaults()?);
        let backup = Arc::new(BackupService::new(
            conn.clone(),
            cipher.clone(),
            &config.backup.dir,
        ));

        Ok(Self {
            conn,
            config,
            jwt,
            cipher,
            passwords,
            backup,
        })
    }

    /// Runs `f` on a pooled connection in the blocking thread pool.
    pub async fn db<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> ApiResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(ApiError::from)?
    }

    /// Argon2 work runs on the blocking pool.
    pub async fn hash_password(&self, password: String) -> ApiResult<String> {
        let hasher = Arc::clone(&self.passwords);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await?
            .map_err(ApiError::from)
    }

    pub async fn verify_password(&self, password: String, hash: String) -> ApiResult<bool> {
        let hasher = Arc::clone(&self.passwords);
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .field("jwt", &"Arc<JwtManager>")
            .field("cipher", &self.cipher)
            .field("backup", &self.backup)
            .finish()
    }
}
