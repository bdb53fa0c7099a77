//! Unauthenticated endpoints reached from links sent to patients.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::Serialize;
use std::sync::Arc;

use crate::core::shared::enums::AppointmentStatus;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::appointments;
use crate::core::shared::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message: &'static str,
    pub status: AppointmentStatus,
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/v1/public/appointments/:id/confirm",
        post(confirm_appointment),
    )
}

pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConfirmResponse>> {
    let status = state
        .db(move |conn| {
            let current: AppointmentStatus = appointments::table
                .find(&id)
                .select(appointments::status)
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::NotFound("Agendamento não encontrado".to_string()))?;
            if current == AppointmentStatus::Cancelled {
                return Err(ApiError::BadRequest(
                    "Este agendamento foi cancelado.".to_string(),
                ));
            }
            diesel::update(appointments::table.find(&id))
                .set(appointments::status.eq(AppointmentStatus::Confirmed))
                .execute(conn)?;
            info!("Appointment {id} confirmed by patient link");
            Ok(AppointmentStatus::Confirmed)
        })
        .await?;

    Ok(Json(ConfirmResponse {
        message: "Confirmado com sucesso",
        status,
    }))
}
