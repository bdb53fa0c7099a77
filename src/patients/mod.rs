//! Patient registry.
//!
//! CPF values are encrypted before they reach the database and decrypted on
//! the way out, so every handler here returns plaintext CPFs. The ciphertext
//! is randomized, so uniqueness is enforced on `cpf_lookup`, a keyed blind
//! index of the plaintext.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::audit::{log_action, AuditEntry};
use crate::core::shared::enums::{JsonDocument, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::patients;
use crate::core::shared::models::Patient;
use crate::core::shared::patch::{apply_present, apply_present_opt};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::new_id;
use crate::security::auth_api::AuthenticatedUser;
use crate::security::encryption::FieldCipher;

const RESOURCE: &str = "Patient";

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub cpf: String,
    pub rg: Option<String>,
    pub birth_date: String,
    pub whatsapp: String,
    pub email: Option<String>,
    #[serde(default = "JsonDocument::empty_object")]
    pub address: JsonDocument,
    #[serde(default)]
    pub personal_income: f64,
    #[serde(default)]
    pub family_income: f64,
    pub observations: Option<String>,
    #[serde(default = "JsonDocument::empty_array")]
    pub files: JsonDocument,
    pub photo: Option<String>,
    pub payment_table_id: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_cpf: Option<String>,
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub lgpd_consent: bool,
    pub lgpd_consent_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub cpf: Option<String>,
    pub rg: Option<String>,
    pub birth_date: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub address: Option<JsonDocument>,
    pub personal_income: Option<f64>,
    pub family_income: Option<f64>,
    pub observations: Option<String>,
    pub files: Option<JsonDocument>,
    pub photo: Option<String>,
    pub payment_table_id: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_cpf: Option<String>,
    pub guardian_phone: Option<String>,
    pub lgpd_consent: Option<bool>,
    pub lgpd_consent_date: Option<String>,
}

impl UpdatePatientRequest {
    /// Applies the present fields to `patient`, returning their names.
    /// `cpf` is expected to be encrypted by the caller already.
    pub fn apply(self, patient: &mut Patient) -> Vec<&'static str> {
        let mut changed = Vec::new();
        apply_present!(patient, self, changed;
            name, cpf, birth_date, whatsapp, address, personal_income,
            family_income, files, lgpd_consent,
        );
        apply_present_opt!(patient, self, changed;
            rg, email, observations, photo, payment_table_id, guardian_name,
            guardian_cpf, guardian_phone, lgpd_consent_date,
        );
        changed
    }
}

pub fn configure_patient_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/patients", get(list_patients).post(create_patient))
        .route(
            "/api/v1/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/api/v1/patients/:id/anonymize", post(anonymize_patient))
}

/// Returns the patient with a readable CPF.
pub fn reveal(cipher: &FieldCipher, mut patient: Patient) -> Patient {
    match cipher.decrypt(&patient.cpf) {
        Ok(plain) => patient.cpf = plain,
        Err(e) => warn!("Could not decrypt CPF of patient {}: {e}", patient.id),
    }
    patient
}

pub const CPF_TAKEN: &str = "CPF already registered";

fn cpf_in_use(
    conn: &mut SqliteConnection,
    lookup: &str,
    except_id: Option<&str>,
) -> QueryResult<bool> {
    let mut q = patients::table
        .filter(patients::cpf_lookup.eq(lookup))
        .into_boxed();
    if let Some(id) = except_id {
        q = q.filter(patients::id.ne(id));
    }
    let count: i64 = q.count().get_result(conn)?;
    Ok(count > 0)
}

/// A write that loses a race on the CPF index still reports the CPF conflict.
fn cpf_conflict(err: diesel::result::Error) -> ApiError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => ApiError::Conflict(CPF_TAKEN.to_string()),
        other => other.into(),
    }
}

fn load_active(conn: &mut SqliteConnection, id: &str) -> ApiResult<Patient> {
    patients::table
        .find(id)
        .filter(patients::active.eq(true))
        .select(Patient::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Patient"))
}

pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Patient>>> {
    let rows = state
        .db(|conn| {
            Ok(patients::table
                .filter(patients::active.eq(true))
                .order(patients::name.asc())
                .select(Patient::as_select())
                .load(conn)?)
        })
        .await?;
    let cipher = &state.cipher;
    Ok(Json(rows.into_iter().map(|p| reveal(cipher, p)).collect()))
}

pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    if req.name.trim().is_empty() || req.cpf.trim().is_empty() {
        return Err(ApiError::BadRequest("name and cpf are required".to_string()));
    }
    let cipher = &state.cipher;
    let patient = Patient {
        id: new_id(),
        name: req.name,
        cpf: cipher.encrypt(req.cpf.trim())?,
        cpf_lookup: cipher.blind_index(&req.cpf),
        rg: req.rg,
        birth_date: req.birth_date,
        whatsapp: req.whatsapp,
        email: req.email,
        address: req.address,
        personal_income: req.personal_income,
        family_income: req.family_income,
        observations: req.observations,
        files: req.files,
        photo: req.photo,
        active: true,
        payment_table_id: req.payment_table_id,
        guardian_name: req.guardian_name,
        guardian_cpf: req.guardian_cpf,
        guardian_phone: req.guardian_phone,
        lgpd_consent: req.lgpd_consent,
        lgpd_consent_date: req.lgpd_consent_date,
    };
    let saved = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                if cpf_in_use(conn, &patient.cpf_lookup, None)? {
                    return Err(ApiError::Conflict(CPF_TAKEN.to_string()));
                }
                diesel::insert_into(patients::table)
                    .values(&patient)
                    .execute(conn)
                    .map_err(cpf_conflict)?;
                log_action(
                    conn,
                    AuditEntry::by(&user, "CREATE", RESOURCE)
                        .with_resource_id(&patient.id)
                        .with_details(json!({ "name": patient.name }).to_string()),
                );
                Ok(patient)
            })
        })
        .await?;

    info!("Patient {} registered", saved.id);
    Ok(Json(reveal(&state.cipher, saved)))
}

pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    let patient = state.db(move |conn| load_active(conn, &id)).await?;
    Ok(Json(reveal(&state.cipher, patient)))
}

pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(mut req): Json<UpdatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    let cipher = &state.cipher;
    let new_cpf = req.cpf.take().map(|c| c.trim().to_string());
    let mut new_lookup = None;
    if let Some(cpf) = new_cpf.as_deref() {
        if cpf.is_empty() {
            return Err(ApiError::BadRequest("cpf cannot be empty".to_string()));
        }
        req.cpf = Some(cipher.encrypt(cpf)?);
        new_lookup = Some(cipher.blind_index(cpf));
    }

    let updated = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let mut patient = load_active(conn, &id)?;
                if let Some(lookup) = new_lookup {
                    if cpf_in_use(conn, &lookup, Some(&id))? {
                        return Err(ApiError::Conflict(CPF_TAKEN.to_string()));
                    }
                    patient.cpf_lookup = lookup;
                }
                let changed = req.apply(&mut patient);
                diesel::update(patients::table.find(&id))
                    .set(&patient)
                    .execute(conn)
                    .map_err(cpf_conflict)?;
                log_action(
                    conn,
                    AuditEntry::by(&user, "UPDATE", RESOURCE)
                        .with_resource_id(&id)
                        .with_details(
                            json!({ "name": patient.name, "changes": changed }).to_string(),
                        ),
                );
                Ok(patient)
            })
        })
        .await?;

    Ok(Json(reveal(&state.cipher, updated)))
}

pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db(move |conn| {
            let patient = load_active(conn, &id)?;
            diesel::update(patients::table.find(&id))
                .set(patients::active.eq(false))
                .execute(conn)?;
            log_action(
                conn,
                AuditEntry::by(&user, "DELETE (SOFT)", RESOURCE)
                    .with_resource_id(&id)
                    .with_details(json!({ "name": patient.name }).to_string()),
            );
            Ok(())
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn anonymized_address() -> JsonDocument {
    JsonDocument(json!({
        "cep": "00000000",
        "street": "ANONIMIZADO",
        "number": "S/N",
        "neighborhood": "ANONIMIZADO",
        "city": "ANONIMIZADO",
        "state": "XX",
    }))
}

/// Irreversibly strips personal data while keeping the row for clinical
/// history and statistics.
pub async fn anonymize_patient(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    user.require_any_role(&[Role::Admin, Role::Staff])?;
    let cipher = &state.cipher;
    let placeholder = format!("ANON-{}", uuid::Uuid::new_v4());
    let placeholder_cpf = cipher.encrypt(&placeholder)?;
    let placeholder_lookup = cipher.blind_index(&placeholder);

    let anonymized = state
        .db(move |conn| {
            let mut patient: Patient = patients::table
                .find(&id)
                .select(Patient::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Patient"))?;
            let original_name = std::mem::take(&mut patient.name);
            let tag = new_id();

            patient.name = format!("ANONIMIZADO-{}", &tag[..8]);
            patient.cpf = placeholder_cpf;
            patient.cpf_lookup = placeholder_lookup;
            patient.rg = None;
            patient.email = None;
            patient.whatsapp = "00000000000".to_string();
            patient.address = anonymized_address();
            patient.observations = None;
            patient.guardian_name = None;
            patient.guardian_cpf = None;
            patient.guardian_phone = None;
            patient.photo = None;
            patient.files = JsonDocument::empty_array();
            patient.active = false;

            diesel::update(patients::table.find(&id))
                .set(&patient)
                .execute(conn)?;
            log_action(
                conn,
                AuditEntry::by(&user, "ANONYMIZE", RESOURCE)
                    .with_resource_id(&id)
                    .with_details(json!({ "original_name": original_name }).to_string()),
            );
            Ok(patient)
        })
        .await?;

    info!("Patient {} anonymized", anonymized.id);
    Ok(Json(reveal(&state.cipher, anonymized)))
}
