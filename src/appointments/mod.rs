//! Appointment book.
//!
//! `amount_paid` and `payment_status` are derived from linked transactions
//! by the financial reconciliation and are never written from request
//! bodies.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::enums::{AppointmentStatus, PaymentStatus};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::{
    appointments, medical_records, patients, transactions, volunteers,
};
use crate::core::shared::models::Appointment;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{is_valid_hhmm, new_id, parse_date};
use crate::financial::reconcile_appointment;
use crate::security::auth_api::AuthenticatedUser;

pub const SLOT_TAKEN: &str = "Horário indisponível. Já existe um agendamento.";

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub volunteer_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<String>,
    pub volunteer_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub volunteer_id: Option<String>,
    pub patient_id: Option<String>,
    pub date: Option<String>,
}

pub fn parse_status(raw: &str) -> ApiResult<AppointmentStatus> {
    raw.parse::<AppointmentStatus>().map_err(ApiError::BadRequest)
}

fn validate_slot(date: &str, time: &str) -> ApiResult<()> {
    if parse_date(date).is_none() {
        return Err(ApiError::BadRequest(format!("Invalid date: {date}")));
    }
    if !is_valid_hhmm(time) {
        return Err(ApiError::BadRequest(format!("Invalid time: {time}")));
    }
    Ok(())
}

/// Whether `volunteer_id` already holds a scheduled appointment in the slot.
pub fn slot_taken(
    conn: &mut SqliteConnection,
    volunteer_id: &str,
    date: &str,
    time: &str,
    except_id: Option<&str>,
) -> QueryResult<bool> {
    let mut q = appointments::table
        .filter(appointments::volunteer_id.eq(volunteer_id))
        .filter(appointments::date.eq(date))
        .filter(appointments::time.eq(time))
        .filter(appointments::status.eq(AppointmentStatus::Scheduled))
        .into_boxed();
    if let Some(id) = except_id {
        q = q.filter(appointments::id.ne(id));
    }
    let count: i64 = q.count().get_result(conn)?;
    Ok(count > 0)
}

/// 409 when `appt`, as about to be saved, would be a second scheduled
/// booking for its volunteer in the same slot.
pub(crate) fn ensure_slot_free(conn: &mut SqliteConnection, appt: &Appointment) -> ApiResult<()> {
    if appt.status != AppointmentStatus::Scheduled {
        return Ok(());
    }
    if let Some(vid) = appt.volunteer_id.as_deref() {
        if slot_taken(conn, vid, &appt.date, &appt.time, Some(&appt.id))? {
            return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
        }
    }
    Ok(())
}

fn ensure_patient(conn: &mut SqliteConnection, patient_id: &str) -> ApiResult<()> {
    let found: i64 = patients::table
        .find(patient_id)
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(ApiError::not_found("Patient"));
    }
    Ok(())
}

fn ensure_volunteer(conn: &mut SqliteConnection, volunteer_id: &str) -> ApiResult<()> {
    let found: i64 = volunteers::table
        .find(volunteer_id)
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(ApiError::not_found("Volunteer"));
    }
    Ok(())
}

pub(crate) fn load(conn: &mut SqliteConnection, id: &str) -> ApiResult<Appointment> {
    appointments::table
        .find(id)
        .select(Appointment::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Appointment"))
}

pub fn configure_appointment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route(
            "/api/v1/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let rows = state
        .db(move |conn| {
            let mut q = appointments::table.into_boxed();
            if let Some(vid) = query.volunteer_id.filter(|s| !s.is_empty()) {
                q = q.filter(appointments::volunteer_id.eq(vid));
            }
            if let Some(pid) = query.patient_id.filter(|s| !s.is_empty()) {
                q = q.filter(appointments::patient_id.eq(pid));
            }
            if let Some(date) = query.date.filter(|s| !s.is_empty()) {
                q = q.filter(appointments::date.eq(date));
            }
            Ok(q
                .order((appointments::date.asc(), appointments::time.asc()))
                .select(Appointment::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<Json<Appointment>> {
    validate_slot(&req.date, &req.time)?;
    let status = match req.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => AppointmentStatus::default(),
    };
    let appointment = Appointment {
        id: new_id(),
        patient_id: req.patient_id,
        volunteer_id: req.volunteer_id.filter(|v| !v.is_empty()),
        date: req.date,
        time: req.time,
        status,
        notes: req.notes,
        price: req.price.unwrap_or(0.0),
        amount_paid: 0.0,
        payment_status: PaymentStatus::Pending,
    };

    let saved = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                ensure_patient(conn, &appointment.patient_id)?;
                if let Some(vid) = appointment.volunteer_id.as_deref() {
                    ensure_volunteer(conn, vid)?;
                    if slot_taken(conn, vid, &appointment.date, &appointment.time, None)? {
                        return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
                    }
                }
                diesel::insert_into(appointments::table)
                    .values(&appointment)
                    .execute(conn)?;
                Ok(appointment)
            })
        })
        .await?;

    info!(
        "Appointment {} booked for {} {} by {}",
        saved.id, saved.date, saved.time, user.id
    );
    Ok(Json(saved))
}

pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(state.db(move |conn| load(conn, &id)).await?))
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> ApiResult<Json<Appointment>> {
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let updated = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let mut appt = load(conn, &id)?;
                let old_price = appt.price;
                let old_slot = (appt.volunteer_id.clone(), appt.date.clone(), appt.time.clone());
                let old_status = appt.status;

                if let Some(pid) = req.patient_id {
                    ensure_patient(conn, &pid)?;
                    appt.patient_id = pid;
                }
                if let Some(vid) = req.volunteer_id {
                    if vid.is_empty() {
                        appt.volunteer_id = None;
                    } else {
                        ensure_volunteer(conn, &vid)?;
                        appt.volunteer_id = Some(vid);
                    }
                }
                if let Some(date) = req.date {
                    appt.date = date;
                }
                if let Some(time) = req.time {
                    appt.time = time;
                }
                if let Some(status) = status {
                    appt.status = status;
                }
                if let Some(notes) = req.notes {
                    appt.notes = Some(notes);
                }
                if let Some(price) = req.price {
                    appt.price = price;
                }
                validate_slot(&appt.date, &appt.time)?;

                let slot_moved =
                    old_slot != (appt.volunteer_id.clone(), appt.date.clone(), appt.time.clone());
                if slot_moved || old_status != appt.status {
                    ensure_slot_free(conn, &appt)?;
                }

                diesel::update(appointments::table.find(&appt.id))
                    .set(&appt)
                    .execute(conn)?;

                if (appt.price - old_price).abs() > f64::EPSILON {
                    if let Some((paid, payment_status)) = reconcile_appointment(conn, &appt.id)? {
                        appt.amount_paid = paid;
                        appt.payment_status = payment_status;
                    }
                }
                Ok(appt)
            })
        })
        .await?;

    Ok(Json(updated))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                load(conn, &id)?;
                let txs = diesel::delete(
                    transactions::table.filter(transactions::appointment_id.eq(&id)),
                )
                .execute(conn)?;
                diesel::delete(medical_records::table.filter(medical_records::appointment_id.eq(&id)))
                    .execute(conn)?;
                diesel::delete(appointments::table.find(&id)).execute(conn)?;
                Ok((id, txs))
            })
        })
        .await?;

    info!(
        "Appointment {} deleted by {} ({} linked transaction(s) removed)",
        removed.0, user.id, removed.1
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_rejects_unknown() {
        assert_eq!(parse_status("finished").ok(), Some(AppointmentStatus::Finished));
        let err = parse_status("done").expect_err("unknown status");
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_validate_slot() {
        assert!(validate_slot("2024-07-01", "09:30").is_ok());
        assert!(validate_slot("01/07/2024", "09:30").is_err());
        assert!(validate_slot("2024-07-01", "9h30").is_err());
    }
}
