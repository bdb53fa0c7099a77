//! System accounts (ADMIN / STAFF / VOLUNTEER logins by username).

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::sync::Arc;

use crate::audit::{record, AuditEntry};
use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::users;
use crate::core::shared::models::{NewUser, User};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::new_id;
use crate::security::auth_api::AuthenticatedUser;

const USERNAME_TAKEN: &str = "Usuário já existe";
const SELF_DELETE: &str = "Não é possível excluir seu próprio usuário";

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub volunteer_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users", get(list_users).post(create_user))
        .route("/api/v1/users/:id", put(update_user).delete(delete_user))
}

fn username_taken(
    conn: &mut SqliteConnection,
    username: &str,
    except_id: Option<&str>,
) -> QueryResult<bool> {
    let mut query = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .into_boxed();
    if let Some(id) = except_id {
        query = query.filter(users::id.ne(id));
    }
    Ok(query.first::<String>(conn).optional()?.is_some())
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<User>>> {
    user.require_role(Role::Admin)?;
    let rows = state
        .db(|conn| {
            Ok(users::table
                .order(users::name.asc())
                .select(User::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    user.require_role(Role::Admin)?;
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    let password = state.hash_password(req.password).await?;
    let new_user = NewUser {
        id: new_id(),
        name: req.name,
        username,
        password,
        role: req.role,
        avatar: req.avatar,
        volunteer_id: req.volunteer_id,
    };

    let created = state
        .db(move |conn| {
            if username_taken(conn, &new_user.username, None)? {
                return Err(ApiError::BadRequest(USERNAME_TAKEN.to_string()));
            }
            diesel::insert_into(users::table)
                .values(&new_user)
                .execute(conn)?;
            Ok(users::table
                .find(&new_user.id)
                .select(User::as_select())
                .first(conn)?)
        })
        .await?;

    info!("User {} created with role {}", created.username, created.role);
    record(
        &state,
        AuditEntry::by(&user, "CREATE", "User")
            .with_resource_id(created.id.clone())
            .with_details(serde_json::json!({ "username": created.username }).to_string()),
    )
    .await;
    Ok(Json(created))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    user.require_role(Role::Admin)?;

    let password = match req.password.filter(|p| !p.is_empty()) {
        Some(plain) => Some(state.hash_password(plain).await?),
        None => None,
    };

    let target_id = id.clone();
    let (updated, changed) = state
        .db(move |conn| {
            let mut account = users::table
                .find(&target_id)
                .select(User::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::NotFound("Usuário não encontrado".to_string()))?;

            let mut changed: Vec<&'static str> = Vec::new();
            if let Some(username) = req.username.map(|u| u.trim().to_string()) {
                if !username.is_empty() && username != account.username {
                    if username_taken(conn, &username, Some(&target_id))? {
                        return Err(ApiError::BadRequest(
                            "Nome de usuário já existe".to_string(),
                        ));
                    }
                    account.username = username;
                    changed.push("username");
                }
            }
            if let Some(name) = req.name.filter(|n| !n.is_empty()) {
                account.name = name;
                changed.push("name");
            }
            if let Some(role) = req.role {
                account.role = role;
                changed.push("role");
            }
            if let Some(avatar) = req.avatar {
                account.avatar = Some(avatar);
                changed.push("avatar");
            }
            if let Some(hash) = password {
                account.password = hash;
                changed.push("password");
            }

            if !changed.is_empty() {
                diesel::update(users::table.find(&target_id))
                    .set(&account)
                    .execute(conn)?;
            }
            Ok((account, changed))
        })
        .await?;

    if !changed.is_empty() {
        record(
            &state,
            AuditEntry::by(&user, "UPDATE", "User")
                .with_resource_id(id)
                .with_details(serde_json::json!({ "changes": changed }).to_string()),
        )
        .await;
    }
    Ok(Json(updated))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(Role::Admin)?;
    if id == user.id {
        return Err(ApiError::BadRequest(SELF_DELETE.to_string()));
    }

    let target_id = id.clone();
    state
        .db(move |conn| {
            let deleted = diesel::delete(users::table.find(&target_id)).execute(conn)?;
            if deleted == 0 {
                return Err(ApiError::NotFound("Usuário não encontrado".to_string()));
            }
            Ok(())
        })
        .await?;

    record(
        &state,
        AuditEntry::by(&user, "DELETE", "User").with_resource_id(id),
    )
    .await;
    Ok(Json(serde_json::json!({ "ok": true })))
}
