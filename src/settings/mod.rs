//! Clinic identity and backup schedule, kept as a single row.

use axum::{extract::State, routing::get, Json, Router};
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::audit::{record, AuditEntry};
use crate::core::shared::enums::{BackupFrequency, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::clinic_settings;
use crate::core::shared::models::ClinicSettings;
use crate::core::shared::patch::{apply_present, apply_present_opt};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::is_valid_hhmm;
use crate::security::auth_api::AuthenticatedUser;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub clinic_name: Option<String>,
    pub company_name: Option<String>,
    pub cnpj: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub backup_frequency: Option<String>,
    pub backup_time: Option<String>,
}

impl UpdateSettingsRequest {
    /// Validates the backup fields and copies every present field onto
    /// `settings`, returning the names of the fields that changed.
    pub fn apply(self, settings: &mut ClinicSettings) -> ApiResult<Vec<&'static str>> {
        let mut changed = Vec::new();

        if let Some(raw) = self.backup_frequency.as_deref() {
            settings.backup_frequency = raw.parse::<BackupFrequency>().map_err(|_| {
                ApiError::BadRequest(
                    "backup_frequency must be manual, daily or weekly".to_string(),
                )
            })?;
            changed.push("backup_frequency");
        }
        if let Some(time) = self.backup_time {
            if !is_valid_hhmm(&time) {
                return Err(ApiError::BadRequest(
                    "backup_time must be HH:MM".to_string(),
                ));
            }
            settings.backup_time = time;
            changed.push("backup_time");
        }

        apply_present!(settings, self, changed; clinic_name, primary_color);
        apply_present_opt!(settings, self, changed;
            company_name, cnpj, address, city, phone, email, website, logo_url,
        );
        Ok(changed)
    }
}

pub fn configure_settings_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/settings", get(get_settings).put(update_settings))
}

/// Returns the settings row, inserting the defaults on first access.
pub fn load_or_create(conn: &mut SqliteConnection) -> QueryResult<ClinicSettings> {
    if let Some(existing) = clinic_settings::table
        .select(ClinicSettings::as_select())
        .first(conn)
        .optional()?
    {
        return Ok(existing);
    }
    let defaults = ClinicSettings::with_defaults();
    diesel::insert_into(clinic_settings::table)
        .values(&defaults)
        .execute(conn)?;
    info!("Created default clinic settings");
    Ok(defaults)
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<ClinicSettings>> {
    let settings = state.db(|conn| Ok(load_or_create(conn)?)).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<ClinicSettings>> {
    user.require_role(Role::Admin)?;

    let (settings, changed) = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let mut settings = load_or_create(conn)?;
                let changed = req.apply(&mut settings)?;
                if !changed.is_empty() {
                    diesel::update(clinic_settings::table.find(&settings.id))
                        .set(&settings)
                        .execute(conn)?;
                }
                Ok((settings, changed))
            })
        })
        .await?;

    if changed
        .iter()
        .any(|f| *f == "backup_frequency" || *f == "backup_time")
    {
        state.backup.reschedule();
    }

    record(
        &state,
        AuditEntry::by(&user, "UPDATE", "Settings")
            .with_resource_id(settings.id.clone())
            .with_details(serde_json::json!({ "changes": changed }).to_string()),
    )
    .await;
    Ok(Json(settings))
}
