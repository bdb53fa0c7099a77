//! Dynamic anamnesis form templates.
//!
//! A template with an empty `specialties` list applies to every specialty.
//! Deleting a template only deactivates it so records filled with it keep
//! their schema.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::enums::JsonDocument;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::form_templates;
use crate::core::shared::models::FormTemplate;
use crate::core::shared::patch::{apply_present, apply_present_opt};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{new_id, now};
use crate::security::auth_api::AuthenticatedUser;

pub const DEFAULT_FORM_TYPE: &str = "dynamic";

fn default_form_type() -> String {
    DEFAULT_FORM_TYPE.to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub title: String,
    #[serde(rename = "type", default = "default_form_type")]
    pub form_type: String,
    #[serde(default = "JsonDocument::empty_object")]
    pub schema_config: JsonDocument,
    #[serde(default = "JsonDocument::empty_array")]
    pub specialties: JsonDocument,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFormRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub form_type: Option<String>,
    pub schema_config: Option<JsonDocument>,
    pub specialties: Option<JsonDocument>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub specialty: Option<String>,
}

fn ensure_specialty_list(doc: &JsonDocument) -> ApiResult<()> {
    match doc.0.as_array() {
        Some(items) if items.iter().all(|v| v.is_string()) => Ok(()),
        _ => Err(ApiError::BadRequest(
            "specialties must be a list of names".to_string(),
        )),
    }
}

fn form_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_forms).post(create_form))
        .route("/:id", put(update_form).get(get_form).delete(delete_form))
}

/// Served under `/forms` and the older `/forms/templates` prefix.
pub fn configure_form_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/v1/forms/templates", form_routes())
        .nest("/api/v1/forms", form_routes())
}

fn load(conn: &mut SqliteConnection, id: &str) -> ApiResult<FormTemplate> {
    form_templates::table
        .find(id)
        .select(FormTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Template"))
}

pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<FormQuery>,
) -> ApiResult<Json<Vec<FormTemplate>>> {
    let rows = state
        .db(|conn| {
            Ok(form_templates::table
                .filter(form_templates::active.eq(true))
                .order(form_templates::created_at.desc())
                .select(FormTemplate::as_select())
                .load(conn)?)
        })
        .await?;

    let rows = match query.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(specialty) => rows.into_iter().filter(|t| t.applies_to(specialty)).collect(),
        None => rows,
    };
    Ok(Json(rows))
}

pub async fn get_form(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<FormTemplate>> {
    Ok(Json(state.db(move |conn| load(conn, &id)).await?))
}

pub async fn create_form(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(req): Json<CreateFormRequest>,
) -> ApiResult<Json<FormTemplate>> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    ensure_specialty_list(&req.specialties)?;
    let template = FormTemplate {
        id: new_id(),
        title: req.title,
        form_type: req.form_type,
        schema_config: req.schema_config,
        specialties: req.specialties,
        description: req.description,
        created_at: now(),
        active: req.active,
    };
    let saved = state
        .db(move |conn| {
            diesel::insert_into(form_templates::table)
                .values(&template)
                .execute(conn)?;
            Ok(template)
        })
        .await?;
    Ok(Json(saved))
}

pub async fn update_form(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateFormRequest>,
) -> ApiResult<Json<FormTemplate>> {
    if let Some(list) = req.specialties.as_ref() {
        ensure_specialty_list(list)?;
    }
    let updated = state
        .db(move |conn| {
            let mut template = load(conn, &id)?;
            let mut changed = Vec::new();
            apply_present!(template, req, changed;
                title, form_type, schema_config, specialties, active,
            );
            apply_present_opt!(template, req, changed; description);
            if !changed.is_empty() {
                diesel::update(form_templates::table.find(&id))
                    .set(&template)
                    .execute(conn)?;
            }
            Ok(template)
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let updated = state
        .db(move |conn| {
            Ok(diesel::update(form_templates::table.find(&id))
                .set(form_templates::active.eq(false))
                .execute(conn)?)
        })
        .await?;
    if updated == 0 {
        return Err(ApiError::not_found("Template"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(specialties: serde_json::Value) -> FormTemplate {
        FormTemplate {
            id: "t1".into(),
            title: "Anamnese nutricional".into(),
            form_type: DEFAULT_FORM_TYPE.into(),
            schema_config: JsonDocument::empty_object(),
            specialties: JsonDocument(specialties),
            description: None,
            created_at: now(),
            active: true,
        }
    }

    #[test]
    fn test_specialty_filter() {
        assert!(template(json!([])).applies_to("Odontologia"));
        assert!(template(json!(["Nutrição"])).applies_to("nutrição"));
        assert!(!template(json!(["Nutrição"])).applies_to("Psicologia"));
    }

    #[test]
    fn test_create_defaults() {
        let req: CreateFormRequest =
            serde_json::from_value(json!({ "title": "Triagem" })).expect("valid body");
        assert_eq!(req.form_type, "dynamic");
        assert_eq!(req.schema_config, JsonDocument::empty_object());
        assert_eq!(req.specialties, JsonDocument::empty_array());
        assert!(req.active);
    }

    #[test]
    fn test_specialties_must_be_names() {
        assert!(ensure_specialty_list(&JsonDocument(json!(["a", "b"]))).is_ok());
        assert!(ensure_specialty_list(&JsonDocument(json!({"a": 1}))).is_err());
        assert!(ensure_specialty_list(&JsonDocument(json!([1]))).is_err());
    }
}
