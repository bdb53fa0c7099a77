//! Fixtures for unit tests: migrated SQLite pools, a fixed cipher and a
//! ready-made `AppState`.

use std::path::Path;
use std::sync::Arc;

use crate::core::config::{AppConfig, DatabaseConfig};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{create_conn, run_migrations, DbPool};
use crate::security::encryption::FieldCipher;

pub const TEST_JWT_SECRET: &str = "unit-test-secret-with-enough-length-0123456789";

/// Single-connection in-memory database with every migration applied.
pub fn test_pool() -> DbPool {
    migrated(DatabaseConfig {
        url: ":memory:".to_string(),
        pool_size: 1,
    })
}

/// File-backed database, for code that needs a real file (backups).
pub fn file_pool(path: &Path) -> DbPool {
    migrated(DatabaseConfig {
        url: path.to_string_lossy().into_owned(),
        pool_size: 2,
    })
}

fn migrated(config: DatabaseConfig) -> DbPool {
    let pool = create_conn(&config).expect("Failed to create test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    pool
}

pub fn test_cipher() -> FieldCipher {
    FieldCipher::new([42u8; 32])
}

pub fn test_config(backup_dir: &Path) -> AppConfig {
    let backup_dir = backup_dir.to_string_lossy().into_owned();
    AppConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some(TEST_JWT_SECRET.to_string()),
        "ENCRYPTION_KEY" => Some("2a".repeat(32)),
        "BACKUP_DIR" => Some(backup_dir.clone()),
        _ => None,
    })
    .expect("Failed to build test config")
}

pub fn test_state(backup_dir: &Path) -> Arc<AppState> {
    Arc::new(AppState::new(test_pool(), test_config(backup_dir)).expect("Failed to build state"))
}
