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
use crate::core::shared::models::schema::specialties;
use crate::core::shared::models::Specialty;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::new_id;
use crate::security::auth_api::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct SpecialtyRequest {
    pub name: String,
    pub anamnesis_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSpecialtyRequest {
    pub name: Option<String>,
    pub anamnesis_type: Option<String>,
}

pub fn configure_specialty_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/specialties",
            get(list_specialties).post(create_specialty),
        )
        .route(
            "/api/v1/specialties/:id",
            put(update_specialty).delete(delete_specialty),
        )
}

fn duplicate_name(err: ApiError) -> ApiError {
    match err {
        ApiError::Conflict(_) => ApiError::Conflict("Specialty name already exists".to_string()),
        other => other,
    }
}

pub async fn list_specialties(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<Specialty>>> {
    let rows = state
        .db(|conn| {
            Ok(specialties::table
                .order(specialties::name.asc())
                .select(Specialty::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_specialty(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(req): Json<SpecialtyRequest>,
) -> ApiResult<Json<Specialty>> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let specialty = Specialty {
        id: new_id(),
        name,
        anamnesis_type: req
            .anamnesis_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| Specialty::DEFAULT_ANAMNESIS.to_string()),
    };
    let saved = state
        .db(move |conn| {
            diesel::insert_into(specialties::table)
                .values(&specialty)
                .execute(conn)
                .map_err(|e| duplicate_name(e.into()))?;
            Ok(specialty)
        })
        .await?;
    Ok(Json(saved))
}

pub async fn update_specialty(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSpecialtyRequest>,
) -> ApiResult<Json<Specialty>> {
    let updated = state
        .db(move |conn| {
            let mut specialty: Specialty = specialties::table
                .find(&id)
                .select(Specialty::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Specialty"))?;
            if let Some(name) = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
                specialty.name = name;
            }
            if let Some(kind) = req.anamnesis_type {
                specialty.anamnesis_type = kind;
            }
            diesel::update(specialties::table.find(&id))
                .set(&specialty)
                .execute(conn)
                .map_err(|e| duplicate_name(e.into()))?;
            Ok(specialty)
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_specialty(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .db(move |conn| Ok(diesel::delete(specialties::table.find(&id)).execute(conn)?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("Specialty"));
    }
    Ok(StatusCode::NO_CONTENT)
}
