//! Attendance: the volunteer's side of the appointment book.
//!
//! Volunteers start, finish and cancel their own consultations; finishing
//! writes the medical record. Records are readable by their author and by
//! clinic staff.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::appointments;
use crate::core::shared::enums::{AppointmentStatus, JsonDocument, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::{
    appointments as appointments_t, medical_records, patients, specialties, volunteers,
};
use crate::core::shared::models::{Appointment, MedicalRecord, Patient, Specialty, Volunteer};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{new_id, now};
use crate::patients::reveal;
use crate::security::auth_api::AuthenticatedUser;

const VOLUNTEERS_ONLY: &str = "Acesso apenas para voluntários";
const NOT_OWNER: &str = "Este agendamento pertence a outro profissional";

#[derive(Debug, Serialize)]
pub struct AgendaItem {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    pub chief_complaint: String,
    pub history: String,
    pub procedures: Option<String>,
    pub prescription: Option<String>,
    pub content: Option<JsonDocument>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub volunteer_name: Option<String>,
    pub appointment_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordView {
    pub appointment: Appointment,
    pub patient: Option<Patient>,
    pub volunteer: Option<Volunteer>,
    pub record: Option<MedicalRecord>,
    pub anamnesis_type: String,
}

pub fn configure_attendance_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/attendance/my-appointments", get(my_appointments))
        .route("/api/v1/attendance/:id/start", post(start_attendance))
        .route("/api/v1/attendance/:id/finish", post(finish_attendance))
        .route("/api/v1/attendance/:id/cancel", post(cancel_attendance))
        .route(
            "/api/v1/attendance/patient/:patient_id/history",
            get(patient_history),
        )
        .route("/api/v1/attendance/:id/record", get(appointment_record))
}

/// The volunteer id the caller acts as; 403 for any other principal.
fn acting_volunteer(user: &AuthenticatedUser) -> ApiResult<String> {
    user.acting_volunteer_id()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Forbidden(VOLUNTEERS_ONLY.to_string()))
}

fn load_owned(
    conn: &mut SqliteConnection,
    appointment_id: &str,
    volunteer_id: &str,
) -> ApiResult<Appointment> {
    let appt = match appointments::load(conn, appointment_id) {
        Err(ApiError::NotFound(_)) => {
            return Err(ApiError::NotFound("Agendamento não encontrado".to_string()))
        }
        other => other?,
    };
    if appt.volunteer_id.as_deref() != Some(volunteer_id) {
        return Err(ApiError::Forbidden(NOT_OWNER.to_string()));
    }
    Ok(appt)
}

fn set_status(
    conn: &mut SqliteConnection,
    mut appt: Appointment,
    status: AppointmentStatus,
) -> ApiResult<Appointment> {
    diesel::update(appointments_t::table.find(&appt.id))
        .set(appointments_t::status.eq(status))
        .execute(conn)?;
    appt.status = status;
    Ok(appt)
}

pub async fn my_appointments(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<AgendaItem>>> {
    let volunteer_id = acting_volunteer(&user)?;
    let rows = state
        .db(move |conn| {
            Ok(appointments_t::table
                .inner_join(patients::table)
                .filter(appointments_t::volunteer_id.eq(&volunteer_id))
                .filter(appointments_t::status.eq_any(AppointmentStatus::agenda()))
                .order((appointments_t::date.asc(), appointments_t::time.asc()))
                .select((Appointment::as_select(), patients::name))
                .load::<(Appointment, String)>(conn)?)
        })
        .await?;
    Ok(Json(
        rows.into_iter()
            .map(|(appointment, patient_name)| AgendaItem {
                appointment,
                patient_name,
            })
            .collect(),
    ))
}

pub async fn start_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Appointment>> {
    let volunteer_id = acting_volunteer(&user)?;
    let appt = state
        .db(move |conn| {
            let appt = load_owned(conn, &id, &volunteer_id)?;
            set_status(conn, appt, AppointmentStatus::InProgress)
        })
        .await?;
    info!("Attendance {} started by volunteer {}", appt.id, user.id);
    Ok(Json(appt))
}

pub async fn cancel_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Appointment>> {
    let volunteer_id = acting_volunteer(&user)?;
    let appt = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let mut appt = load_owned(conn, &id, &volunteer_id)?;
                if appt.status != AppointmentStatus::Scheduled {
                    appt.status = AppointmentStatus::Scheduled;
                    appointments::ensure_slot_free(conn, &appt)?;
                }
                set_status(conn, appt, AppointmentStatus::Scheduled)
            })
        })
        .await?;
    Ok(Json(appt))
}

/// Marks the consultation finished and writes (or rewrites) its record in
/// one database transaction.
pub async fn finish_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<FinishRequest>,
) -> ApiResult<Json<MedicalRecord>> {
    let volunteer_id = acting_volunteer(&user)?;
    let record = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let appt = load_owned(conn, &id, &volunteer_id)?;
                let appt = set_status(conn, appt, AppointmentStatus::Finished)?;
                let content = req.content.unwrap_or_else(JsonDocument::empty_object);

                let existing: Option<MedicalRecord> = medical_records::table
                    .filter(medical_records::appointment_id.eq(&appt.id))
                    .select(MedicalRecord::as_select())
                    .first(conn)
                    .optional()?;

                let record = match existing {
                    Some(mut record) => {
                        record.chief_complaint = req.chief_complaint;
                        record.history = req.history;
                        record.procedures = req.procedures;
                        record.prescription = req.prescription;
                        record.content = content;
                        record.volunteer_id = volunteer_id;
                        record.updated_at = now();
                        diesel::update(medical_records::table.find(&record.id))
                            .set(&record)
                            .execute(conn)?;
                        record
                    }
                    None => {
                        let stamp = now();
                        let record = MedicalRecord {
                            id: new_id(),
                            appointment_id: appt.id.clone(),
                            patient_id: appt.patient_id.clone(),
                            volunteer_id,
                            chief_complaint: req.chief_complaint,
                            history: req.history,
                            procedures: req.procedures,
                            prescription: req.prescription,
                            content,
                            created_at: stamp,
                            updated_at: stamp,
                        };
                        diesel::insert_into(medical_records::table)
                            .values(&record)
                            .execute(conn)?;
                        record
                    }
                };
                Ok(record)
            })
        })
        .await?;
    info!(
        "Attendance {} finished, record {}",
        record.appointment_id, record.id
    );
    Ok(Json(record))
}

pub async fn patient_history(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    user.require_any_role(&[Role::Volunteer, Role::Admin, Role::Staff])?;
    let rows = state
        .db(move |conn| {
            Ok(medical_records::table
                .left_join(volunteers::table)
                .left_join(appointments_t::table)
                .filter(medical_records::patient_id.eq(&patient_id))
                .order(medical_records::created_at.desc())
                .select((
                    MedicalRecord::as_select(),
                    volunteers::name.nullable(),
                    appointments_t::date.nullable(),
                ))
                .load::<(MedicalRecord, Option<String>, Option<String>)>(conn)?)
        })
        .await?;
    Ok(Json(
        rows.into_iter()
            .map(|(record, volunteer_name, appointment_date)| HistoryEntry {
                record,
                volunteer_name,
                appointment_date,
            })
            .collect(),
    ))
}

pub async fn appointment_record(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordView>> {
    user.require_any_role(&[Role::Volunteer, Role::Admin, Role::Staff])?;
    let caller_volunteer = user.acting_volunteer_id().map(str::to_string);
    let is_volunteer = user.role == Role::Volunteer;

    let mut view = state
        .db(move |conn| {
            let appointment = appointments::load(conn, &id)
                .map_err(|_| ApiError::NotFound("Agendamento não encontrado".to_string()))?;
            if is_volunteer && appointment.volunteer_id != caller_volunteer {
                return Err(ApiError::Forbidden(NOT_OWNER.to_string()));
            }

            let patient = patients::table
                .find(&appointment.patient_id)
                .select(Patient::as_select())
                .first(conn)
                .optional()?;
            let volunteer = match appointment.volunteer_id.as_deref() {
                Some(vid) => volunteers::table
                    .find(vid)
                    .select(Volunteer::as_select())
                    .first(conn)
                    .optional()?,
                None => None,
            };
            let record = medical_records::table
                .filter(medical_records::appointment_id.eq(&appointment.id))
                .select(MedicalRecord::as_select())
                .first(conn)
                .optional()?;

            let anamnesis_type = match volunteer.as_ref() {
                Some(v) if !v.specialty.is_empty() => specialties::table
                    .filter(specialties::name.eq(&v.specialty))
                    .select(Specialty::as_select())
                    .first(conn)
                    .optional()?
                    .map(|s| s.anamnesis_type),
                _ => None,
            }
            .unwrap_or_else(|| Specialty::DEFAULT_ANAMNESIS.to_string());

            Ok(RecordView {
                appointment,
                patient,
                volunteer,
                record,
                anamnesis_type,
            })
        })
        .await?;

    view.patient = view.patient.take().map(|p| reveal(&state.cipher, p));
    Ok(Json(view))
}
