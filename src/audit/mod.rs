//! Audit trail: the append-only `audit_logs` table, the middleware that
//! records sensitive reads, and the admin listing endpoint.

pub mod middleware;
pub mod service;

pub use middleware::audit_middleware;
pub use service::{log_action, record, AuditEntry};

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::audit_logs;
use crate::core::shared::models::AuditLog;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{day_end_exclusive, parse_date, parse_datetime};
use crate::security::auth_api::AuthenticatedUser;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub fn configure_audit_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/audit", get(list_audit_logs))
}

pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    user.require_role(Role::Admin)?;

    let start = match query.start_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            parse_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid start_date: {raw}")))?,
        ),
        None => None,
    };

    // A bare date as end bound means "through the end of that day".
    let end = match query.end_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) if raw.len() == 10 => Some((
            parse_date(raw)
                .map(day_end_exclusive)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid end_date: {raw}")))?,
            true,
        )),
        Some(raw) => Some((
            parse_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid end_date: {raw}")))?,
            false,
        )),
        None => None,
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);
    let user_filter = query.user_id.filter(|s| !s.is_empty());

    let rows = state
        .db(move |conn| {
            let mut q = audit_logs::table.into_boxed();
            if let Some(uid) = user_filter {
                q = q.filter(audit_logs::user_id.eq(uid));
            }
            if let Some(start) = start {
                q = q.filter(audit_logs::timestamp.ge(start));
            }
            match end {
                Some((bound, true)) => q = q.filter(audit_logs::timestamp.lt(bound)),
                Some((bound, false)) => q = q.filter(audit_logs::timestamp.le(bound)),
                None => {}
            }
            let rows = q
                .order((audit_logs::timestamp.desc(), audit_logs::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(AuditLog::as_select())
                .load(conn)?;
            Ok(rows)
        })
        .await?;

    Ok(Json(rows))
}
