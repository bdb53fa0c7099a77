//! Encrypted database snapshots.
//!
//! A snapshot is taken with `VACUUM INTO`, sealed with the field cipher and
//! written as `encrypted_backup_<YYYYmmdd_HHMMSS_micros>.enc` in the backup
//! directory.

use anyhow::{anyhow, Context, Result};
use diesel::prelude::*;
use diesel::sql_types::Text;
use log::{error, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use crate::core::shared::enums::BackupFrequency;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::clinic_settings;
use crate::core::shared::utils::DbPool;
use crate::security::encryption::FieldCipher;

pub const BACKUP_PREFIX: &str = "encrypted_backup_";
pub const BACKUP_EXTENSION: &str = "enc";

const FALLBACK_TIME: (u32, u32) = (3, 0);

#[derive(Debug, Clone, Serialize)]
pub struct BackupFile {
    pub filename: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub created_at: f64,
}

pub struct BackupService {
    pool: DbPool,
    cipher: FieldCipher,
    dir: PathBuf,
    schedule_changed: AtomicBool,
    running: Mutex<()>,
}

impl std::fmt::Debug for BackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupService")
            .field("dir", &self.dir)
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

/// Cron expression (seconds first) for the configured frequency and
/// `HH:MM`; `None` for manual backups. Malformed times fall back to 03:00.
pub fn cron_expression(frequency: BackupFrequency, time: &str) -> Option<String> {
    let (hour, minute) = time
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .filter(|(h, m)| *h < 24 && *m < 60)
        .unwrap_or(FALLBACK_TIME);
    match frequency {
        BackupFrequency::Manual => None,
        BackupFrequency::Daily => Some(format!("0 {minute} {hour} * * *")),
        BackupFrequency::Weekly => Some(format!("0 {minute} {hour} * * Sun")),
    }
}

/// Accepts only a bare file name, never a path.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

impl BackupService {
    pub fn new(pool: DbPool, cipher: FieldCipher, dir: impl AsRef<Path>) -> Self {
        Self {
            pool,
            cipher,
            dir: dir.as_ref().to_path_buf(),
            schedule_changed: AtomicBool::new(true),
            running: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Flags the schedule for reload on the scheduler's next tick.
    pub fn reschedule(&self) {
        self.schedule_changed.store(true, Ordering::SeqCst);
        info!("Backup schedule marked for reload");
    }

    pub(crate) fn take_schedule_change(&self) -> bool {
        self.schedule_changed.swap(false, Ordering::SeqCst)
    }

    /// Cron expression for the stored settings, if automatic backups are on.
    pub fn current_schedule(&self) -> Result<Option<String>> {
        let mut conn = self.pool.get()?;
        let row: Option<(BackupFrequency, String)> = clinic_settings::table
            .select((clinic_settings::backup_frequency, clinic_settings::backup_time))
            .first(&mut conn)
            .optional()?;
        Ok(row.and_then(|(frequency, time)| cron_expression(frequency, &time)))
    }

    /// Takes an encrypted snapshot and returns its file name.
    pub fn perform_backup(&self) -> Result<String> {
        let _guard = self
            .running
            .lock()
            .map_err(|_| anyhow!("Backup lock poisoned"))?;

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create backup dir {}", self.dir.display()))?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
        let filename = format!("{BACKUP_PREFIX}{stamp}.{BACKUP_EXTENSION}");
        let snapshot = self.dir.join(format!(".{filename}.sqlite.tmp"));
        if snapshot.exists() {
            std::fs::remove_file(&snapshot)?;
        }

        let mut conn = self.pool.get()?;
        let snapshot_path = snapshot
            .to_str()
            .ok_or_else(|| anyhow!("Backup path is not valid UTF-8"))?
            .to_string();
        diesel::sql_query("VACUUM INTO ?")
            .bind::<Text, _>(&snapshot_path)
            .execute(&mut conn)
            .context("VACUUM INTO failed")?;

        let plain = std::fs::read(&snapshot);
        if let Err(e) = std::fs::remove_file(&snapshot) {
            warn!("Could not remove snapshot {}: {e}", snapshot.display());
        }
        let sealed = self.cipher.encrypt_bytes(&plain?)?;
        let mut out = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.dir.join(&filename))
            .with_context(|| format!("Backup {filename} already exists"))?;
        out.write_all(&sealed)?;

        let finished = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        if let Err(e) = diesel::update(clinic_settings::table)
            .set(clinic_settings::last_backup_at.eq(Some(finished)))
            .execute(&mut conn)
        {
            error!("Backup {filename} written but last_backup_at not updated: {e}");
        }

        info!("Backup saved to {}", self.dir.join(&filename).display());
        Ok(filename)
    }

    /// Encrypted backups in the directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let created_at = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            files.push(BackupFile {
                filename: filename.to_string(),
                size: meta.len(),
                created_at,
            });
        }
        files.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
        Ok(files)
    }

    /// Resolves a download request to a file inside the backup directory.
    pub fn backup_path(&self, filename: &str) -> ApiResult<PathBuf> {
        if !is_plain_file_name(filename) {
            return Err(ApiError::BadRequest("Invalid backup file name".to_string()));
        }
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(ApiError::not_found("Backup"));
        }
        Ok(path)
    }

    /// Restores the plaintext SQLite image from an encrypted backup.
    pub fn decrypt_backup(&self, path: &Path) -> Result<Vec<u8>> {
        let sealed = std::fs::read(path)
            .with_context(|| format!("Cannot read backup {}", path.display()))?;
        self.cipher.decrypt_bytes(&sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{file_pool, test_cipher, test_pool};

    #[test]
    fn test_cron_expressions() {
        assert_eq!(cron_expression(BackupFrequency::Manual, "03:00"), None);
        assert_eq!(
            cron_expression(BackupFrequency::Daily, "22:15").as_deref(),
            Some("0 15 22 * * *")
        );
        assert_eq!(
            cron_expression(BackupFrequency::Weekly, "07:05").as_deref(),
            Some("0 5 7 * * Sun")
        );
        assert_eq!(
            cron_expression(BackupFrequency::Daily, "garbage").as_deref(),
            Some("0 0 3 * * *")
        );
    }

    #[test]
    fn test_file_name_guard() {
        assert!(is_plain_file_name("encrypted_backup_20240101_030000_123456.enc"));
        assert!(!is_plain_file_name("../clinica.db"));
        assert!(!is_plain_file_name("sub/file.enc"));
        assert!(!is_plain_file_name("..\\file.enc"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn test_backup_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("clinic.db");
        let pool = file_pool(&db);
        let service = BackupService::new(pool, test_cipher(), dir.path().join("backups"));

        let filename = service.perform_backup().expect("backup");
        assert!(filename.starts_with(BACKUP_PREFIX));
        assert!(filename.ends_with(".enc"));

        let listed = service.list_backups().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, filename);

        let path = service.backup_path(&filename).expect("path");
        let sealed = std::fs::read(&path).expect("read");
        assert!(!sealed.starts_with(b"SQLite format 3"));
        let plain = service.decrypt_backup(&path).expect("decrypt");
        assert!(plain.starts_with(b"SQLite format 3\0"));

        assert!(matches!(
            service.backup_path("../clinic.db"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            service.backup_path("missing.enc"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_back_to_back_backups_keep_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = file_pool(&dir.path().join("clinic.db"));
        let service = BackupService::new(pool, test_cipher(), dir.path().join("backups"));

        let first = service.perform_backup().expect("first backup");
        let second = service.perform_backup().expect("second backup");
        assert_ne!(first, second);

        let mut names: Vec<String> = service
            .list_backups()
            .expect("list")
            .into_iter()
            .map(|b| b.filename)
            .collect();
        names.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_schedule_reads_settings() {
        let pool = test_pool();
        let service = BackupService::new(pool.clone(), test_cipher(), "unused");
        assert_eq!(service.current_schedule().expect("schedule"), None);

        let mut conn = pool.get().expect("conn");
        let mut settings = crate::settings::load_or_create(&mut conn).expect("settings");
        settings.backup_frequency = BackupFrequency::Daily;
        settings.backup_time = "01:30".into();
        diesel::update(clinic_settings::table.find(&settings.id))
            .set(&settings)
            .execute(&mut conn)
            .expect("update");
        drop(conn);

        assert_eq!(
            service.current_schedule().expect("schedule").as_deref(),
            Some("0 30 1 * * *")
        );
        assert!(service.take_schedule_change());
        assert!(!service.take_schedule_change());
        service.reschedule();
        assert!(service.take_schedule_change());
    }
}
