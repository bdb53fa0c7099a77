//! Volunteer (clinical staff) registry. Volunteers log in with their e-mail,
//! so every password written here is Argon2-hashed first.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::audit::{log_action, AuditEntry};
use crate::core::shared::enums::JsonDocument;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::{appointments, volunteers};
use crate::core::shared::models::Volunteer;
use crate::core::shared::patch::{apply_present, apply_present_opt};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::new_id;
use crate::security::auth_api::AuthenticatedUser;

const RESOURCE: &str = "Volunteer";
pub const DEFAULT_APPOINTMENT_DURATION: i32 = 60;

fn default_duration() -> i32 {
    DEFAULT_APPOINTMENT_DURATION
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateVolunteerRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub birth_date: String,
    pub phone: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default = "JsonDocument::empty_array")]
    pub availability: JsonDocument,
    #[serde(default = "JsonDocument::empty_array")]
    pub files: JsonDocument,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "default_duration")]
    pub appointment_duration: i32,
    pub photo: Option<String>,
    #[serde(default)]
    pub lgpd_consent: bool,
    pub lgpd_consent_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVolunteerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub availability: Option<JsonDocument>,
    pub files: Option<JsonDocument>,
    pub active: Option<bool>,
    pub appointment_duration: Option<i32>,
    pub photo: Option<String>,
    pub lgpd_consent: Option<bool>,
    pub lgpd_consent_date: Option<String>,
}

impl UpdateVolunteerRequest {
    /// `password` must already hold a hash when present.
    pub fn apply(self, volunteer: &mut Volunteer) -> Vec<&'static str> {
        let mut changed = Vec::new();
        apply_present!(volunteer, self, changed;
            name, email, password, birth_date, phone, specialty, license_number,
            availability, files, active, appointment_duration, lgpd_consent,
        );
        apply_present_opt!(volunteer, self, changed; photo, lgpd_consent_date);
        changed
    }
}

pub fn configure_volunteer_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/volunteers", get(list_volunteers).post(create_volunteer))
        .route(
            "/api/v1/volunteers/:id",
            get(get_volunteer)
                .put(update_volunteer)
                .delete(delete_volunteer),
        )
}

pub(crate) fn load_active(conn: &mut SqliteConnection, id: &str) -> ApiResult<Volunteer> {
    volunteers::table
        .find(id)
        .filter(volunteers::active.eq(true))
        .select(Volunteer::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Volunteer"))
}

pub async fn list_volunteers(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Volunteer>>> {
    let rows = state
        .db(|conn| {
            Ok(volunteers::table
                .filter(volunteers::active.eq(true))
                .order(volunteers::name.asc())
                .select(Volunteer::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_volunteer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateVolunteerRequest>,
) -> ApiResult<Json<Volunteer>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("email and password are required".to_string()));
    }
    let password = state.hash_password(req.password).await?;
    let volunteer = Volunteer {
        id: new_id(),
        name: req.name,
        email: req.email.trim().to_string(),
        password,
        birth_date: req.birth_date,
        phone: req.phone,
        specialty: req.specialty,
        license_number: req.license_number,
        availability: req.availability,
        files: req.files,
        active: req.active,
        appointment_duration: req.appointment_duration,
        photo: req.photo,
        lgpd_consent: req.lgpd_consent,
        lgpd_consent_date: req.lgpd_consent_date,
    };

    let saved = state
        .db(move |conn| {
            diesel::insert_into(volunteers::table)
                .values(&volunteer)
                .execute(conn)
                .map_err(|e| match ApiError::from(e) {
                    ApiError::Conflict(_) => {
                        ApiError::Conflict("E-mail already registered".to_string())
                    }
                    other => other,
                })?;
            log_action(
                conn,
                AuditEntry::by(&user, "CREATE", RESOURCE)
                    .with_resource_id(&volunteer.id)
                    .with_details(json!({ "name": volunteer.name }).to_string()),
            );
            Ok(volunteer)
        })
        .await?;

    info!("Volunteer {} registered ({})", saved.id, saved.specialty);
    Ok(Json(saved))
}

pub async fn get_volunteer(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Volunteer>> {
    Ok(Json(state.db(move |conn| load_active(conn, &id)).await?))
}

pub async fn update_volunteer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(mut req): Json<UpdateVolunteerRequest>,
) -> ApiResult<Json<Volunteer>> {
    if let Some(password) = req.password.take().filter(|p| !p.is_empty()) {
        req.password = Some(state.hash_password(password).await?);
    }

    let updated = state
        .db(move |conn| {
            let mut volunteer = load_active(conn, &id)?;
            let changed = req.apply(&mut volunteer);
            diesel::update(volunteers::table.find(&id))
                .set(&volunteer)
                .execute(conn)?;
            log_action(
                conn,
                AuditEntry::by(&user, "UPDATE", RESOURCE)
                    .with_resource_id(&id)
                    .with_details(
                        json!({ "name": volunteer.name, "changes": changed }).to_string(),
                    ),
            );
            Ok(volunteer)
        })
        .await?;

    Ok(Json(updated))
}

pub async fn delete_volunteer(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db(move |conn| {
            let volunteer = load_active(conn, &id)?;
            let linked: i64 = appointments::table
                .filter(appointments::volunteer_id.eq(&id))
                .count()
                .get_result(conn)?;
            if linked > 0 {
                return Err(ApiError::BadRequest(
                    "Não é possível excluir. Voluntário possui agendamentos vinculados."
                        .to_string(),
                ));
            }
            diesel::update(volunteers::table.find(&id))
                .set(volunteers::active.eq(false))
                .execute(conn)?;
            log_action(
                conn,
                AuditEntry::by(&user, "DELETE (SOFT)", RESOURCE)
                    .with_resource_id(&id)
                    .with_details(json!({ "name": volunteer.name }).to_string()),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
