use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::{BackupFrequency, Role};
use crate::core::shared::models::schema::{audit_logs, clinic_settings, users};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub volunteer_id: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub volunteer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = audit_logs)]
pub struct AuditLog {
    pub id: i32,
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// Singleton row holding clinic identity and backup schedule.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = clinic_settings)]
#[diesel(treat_none_as_null = true)]
pub struct ClinicSettings {
    pub id: String,
    pub clinic_name: String,
    pub company_name: Option<String>,
    pub cnpj: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub backup_frequency: BackupFrequency,
    pub backup_time: String,
    pub last_backup_at: Option<String>,
}

impl ClinicSettings {
    pub const DEFAULT_CLINIC_NAME: &'static str = "Clínica Cuidar";
    pub const DEFAULT_PRIMARY_COLOR: &'static str = "#059669";
    pub const DEFAULT_BACKUP_TIME: &'static str = "03:00";

    pub fn with_defaults() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            clinic_name: Self::DEFAULT_CLINIC_NAME.to_string(),
            company_name: None,
            cnpj: None,
            address: None,
            city: None,
            phone: None,
            email: None,
            website: None,
            logo_url: None,
            primary_color: Self::DEFAULT_PRIMARY_COLOR.to_string(),
            backup_frequency: BackupFrequency::Manual,
            backup_time: Self::DEFAULT_BACKUP_TIME.to_string(),
            last_backup_at: None,
        }
    }
}
