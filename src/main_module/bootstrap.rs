//! Startup tasks that run once the pool is migrated.

use diesel::prelude::*;
use log::{info, warn};

use crate::core::config::AppConfig;
use crate::core::shared::enums::Role;
use crate::core::shared::models::schema::users;
use crate::core::shared::models::NewUser;
use crate::core::shared::utils::{new_id, DbPool};
use crate::security::password::PasswordHasher2;

/// Creates the configured admin account if no user with that username
/// exists. Returns `true` when a row was inserted.
pub fn seed_admin(pool: &DbPool, config: &AppConfig) -> anyhow::Result<bool> {
    let Some(admin) = config.bootstrap_admin.as_ref() else {
        return Ok(false);
    };
    if admin.password.len() < 8 {
        warn!("ADMIN_PASSWORD is shorter than 8 characters");
    }

    let mut conn = pool.get()?;
    let exists = users::table
        .filter(users::username.eq(&admin.username))
        .select(users::id)
        .first::<String>(&mut conn)
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    let password = PasswordHasher2::with_defaults()?.hash(&admin.password)?;
    diesel::insert_into(users::table)
        .values(&NewUser {
            id: new_id(),
            name: "Administrador".to_string(),
            username: admin.username.clone(),
            password,
            role: Role::Admin,
            avatar: None,
            volunteer_id: None,
        })
        .execute(&mut conn)?;
    info!("Seeded admin user '{}'", admin.username);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BootstrapAdmin;
    use crate::core::shared::test_utils::{test_config, test_pool};

    #[test]
    fn test_seed_admin_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = test_pool();
        let mut config = test_config(dir.path());
        assert!(!seed_admin(&pool, &config).expect("no admin configured"));

        config.bootstrap_admin = Some(BootstrapAdmin {
            username: "admin".into(),
            password: "troque-esta-senha".into(),
        });
        assert!(seed_admin(&pool, &config).expect("seed"));
        assert!(!seed_admin(&pool, &config).expect("second seed"));

        let mut conn = pool.get().expect("conn");
        let role: Role = users::table
            .filter(users::username.eq("admin"))
            .select(users::role)
            .first(&mut conn)
            .expect("admin row");
        assert_eq!(role, Role::Admin);
    }
}
