//! Named price lists a patient can be attached to.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::payment_tables;
use crate::core::shared::models::PaymentTable;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::new_id;
use crate::security::auth_api::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct PaymentTableRequest {
    pub name: String,
    pub value: f64,
}

pub fn configure_payment_table_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/payment-tables",
            get(list_payment_tables).post(create_payment_table),
        )
        .route(
            "/api/v1/payment-tables/:id",
            put(update_payment_table).delete(delete_payment_table),
        )
}

fn validate(req: &PaymentTableRequest) -> ApiResult<()> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if !req.value.is_finite() || req.value < 0.0 {
        return Err(ApiError::BadRequest("value must be a non-negative number".to_string()));
    }
    Ok(())
}

pub async fn list_payment_tables(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<PaymentTable>>> {
    let rows = state
        .db(|conn| {
            Ok(payment_tables::table
                .order(payment_tables::name.asc())
                .select(PaymentTable::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_payment_table(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(req): Json<PaymentTableRequest>,
) -> ApiResult<Json<PaymentTable>> {
    validate(&req)?;
    let table = PaymentTable {
        id: new_id(),
        name: req.name.trim().to_string(),
        value: req.value,
    };
    let saved = state
        .db(move |conn| {
            diesel::insert_into(payment_tables::table)
                .values(&table)
                .execute(conn)?;
            Ok(table)
        })
        .await?;
    Ok(Json(saved))
}

pub async fn update_payment_table(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<PaymentTableRequest>,
) -> ApiResult<Json<PaymentTable>> {
    validate(&req)?;
    let table = PaymentTable {
        id,
        name: req.name.trim().to_string(),
        value: req.value,
    };
    let saved = state
        .db(move |conn| {
            let updated = diesel::update(payment_tables::table.find(&table.id))
                .set(&table)
                .execute(conn)?;
            if updated == 0 {
                return Err(ApiError::not_found("Payment table"));
            }
            Ok(table)
        })
        .await?;
    Ok(Json(saved))
}

pub async fn delete_payment_table(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .db(move |conn| Ok(diesel::delete(payment_tables::table.find(&id)).execute(conn)?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Payment table"));
    }
    Ok(StatusCode::NO_CONTENT)
}
