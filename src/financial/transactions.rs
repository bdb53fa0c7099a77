use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use super::reconcile::reconcile_appointment;
use crate::core::shared::enums::{PaymentMethod, TransactionType};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::transactions;
use crate::core::shared::models::Transaction;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    day_end_exclusive, day_start, new_id, now, parse_date, parse_datetime,
};
use crate::security::auth_api::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub description: String,
    pub date: Option<String>,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTransactionRequest {
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date_filter: Option<String>,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
}

/// Parses an optional `YYYY-MM-DD` query value; blank counts as absent.
pub(super) fn query_date(
    raw: Option<&str>,
    field: &str,
) -> ApiResult<Option<chrono::NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {field}: {value}"))),
        None => Ok(None),
    }
}

fn body_datetime(raw: &str) -> ApiResult<chrono::NaiveDateTime> {
    parse_datetime(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid date: {raw}")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTransactionRequest>,
) -> ApiResult<Json<Transaction>> {
    let date = match req.date.as_deref() {
        Some(raw) => body_datetime(raw)?,
        None => now(),
    };
    let tx = Transaction {
        id: new_id(),
        amount: req.amount,
        kind: req.kind,
        date,
        description: req.description,
        patient_id: blank_to_none(req.patient_id),
        appointment_id: blank_to_none(req.appointment_id),
        payment_method: req.payment_method,
        created_at: now(),
        created_by: Some(user.id.clone()),
    };

    let saved = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                diesel::insert_into(transactions::table)
                    .values(&tx)
                    .execute(conn)?;
                if let Some(appointment_id) = tx.appointment_id.as_deref() {
                    reconcile_appointment(conn, appointment_id)?;
                }
                Ok(tx)
            })
        })
        .await?;

    info!(
        "Transaction {} registered by {}: {} {:.2}",
        saved.id, user.id, saved.kind, saved.amount
    );
    Ok(Json(saved))
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let exact = query_date(query.date_filter.as_deref(), "date_filter")?;
    let start = query_date(query.start_date.as_deref(), "start_date")?;
    let end = query_date(query.end_date.as_deref(), "end_date")?;
    let (start, end) = match exact {
        Some(day) => (Some(day), Some(day)),
        None => (start, end),
    };
    let patient_id = blank_to_none(query.patient_id);
    let appointment_id = blank_to_none(query.appointment_id);

    let rows = state
        .db(move |conn| {
            let mut q = transactions::table.into_boxed();
            if let Some(day) = start {
                q = q.filter(transactions::date.ge(day_start(day)));
            }
            if let Some(day) = end {
                q = q.filter(transactions::date.lt(day_end_exclusive(day)));
            }
            if let Some(pid) = patient_id {
                q = q.filter(transactions::patient_id.eq(pid));
            }
            if let Some(aid) = appointment_id {
                q = q.filter(transactions::appointment_id.eq(aid));
            }
            Ok(q
                .order(transactions::date.desc())
                .select(Transaction::as_select())
                .load(conn)?)
        })
        .await?;

    Ok(Json(rows))
}

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    let tx = state
        .db(move |conn| {
            transactions::table
                .find(&id)
                .select(Transaction::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Transaction"))
        })
        .await?;
    Ok(Json(tx))
}

pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTransactionRequest>,
) -> ApiResult<Json<Transaction>> {
    let new_date = req.date.as_deref().map(body_datetime).transpose()?;

    let updated = state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let mut tx: Transaction = transactions::table
                    .find(&id)
                    .select(Transaction::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Transaction"))?;
                let previous_appointment = tx.appointment_id.clone();

                if let Some(amount) = req.amount {
                    tx.amount = amount;
                }
                if let Some(kind) = req.kind {
                    tx.kind = kind;
                }
                if let Some(description) = req.description {
                    tx.description = description;
                }
                if let Some(date) = new_date {
                    tx.date = date;
                }
                if let Some(patient_id) = req.patient_id {
                    tx.patient_id = blank_to_none(Some(patient_id));
                }
                if let Some(appointment_id) = req.appointment_id {
                    tx.appointment_id = blank_to_none(Some(appointment_id));
                }
                if let Some(method) = req.payment_method {
                    tx.payment_method = method;
                }

                diesel::update(transactions::table.find(&tx.id))
                    .set(&tx)
                    .execute(conn)?;

                if let Some(old) = previous_appointment.as_deref() {
                    if tx.appointment_id.as_deref() != Some(old) {
                        reconcile_appointment(conn, old)?;
                    }
                }
                if let Some(current) = tx.appointment_id.as_deref() {
                    reconcile_appointment(conn, current)?;
                }
                Ok(tx)
            })
        })
        .await?;

    Ok(Json(updated))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted_id = id.clone();
    state
        .db(move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let appointment_id: Option<String> = transactions::table
                    .find(&id)
                    .select(transactions::appointment_id)
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("Transaction"))?;

                diesel::delete(transactions::table.find(&id)).execute(conn)?;

                if let Some(appointment_id) = appointment_id.as_deref() {
                    reconcile_appointment(conn, appointment_id)?;
                }
                Ok(())
            })
        })
        .await?;

    info!("Transaction {deleted_id} deleted by {}", user.id);
    Ok(Json(serde_json::json!({ "ok": true })))
}
