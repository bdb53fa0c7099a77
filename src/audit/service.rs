use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{error, trace};
use std::sync::Arc;

use crate::core::shared::models::schema::audit_logs;
use crate::core::shared::models::NewAuditLog;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::now;
use crate::security::auth_api::AuthenticatedUser;

/// One row of the audit trail, built up before it is written.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: String,
    pub user_name: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, action: &str, resource: &str) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: None,
            details: None,
            ip_address: None,
        }
    }

    pub fn by(user: &AuthenticatedUser, action: &str, resource: &str) -> Self {
        Self::new(&user.id, &user.name, action, resource)
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    fn into_row(self) -> NewAuditLog {
        NewAuditLog {
            user_id: self.user_id,
            user_name: self.user_name,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            details: self.details,
            ip_address: self.ip_address,
            timestamp: now(),
        }
    }
}

/// Appends `entry` to the audit trail.
///
/// A failed insert is logged and swallowed: the request that triggered the
/// entry has already succeeded and must not be turned into an error.
pub fn log_action(conn: &mut SqliteConnection, entry: AuditEntry) {
    trace!(
        "audit {} {} {:?} by {}",
        entry.action,
        entry.resource,
        entry.resource_id,
        entry.user_id
    );
    let result = diesel::insert_into(audit_logs::table)
        .values(entry.into_row())
        .execute(conn);
    if let Err(e) = result {
        error!("Failed to write audit log: {e}");
    }
}

/// Async wrapper for handlers that no longer hold a connection.
pub async fn record(state: &Arc<AppState>, entry: AuditEntry) {
    let pool = state.conn.clone();
    let outcome = tokio::task::spawn_blocking(move || match pool.get() {
        Ok(mut conn) => log_action(&mut conn, entry),
        Err(e) => error!("Audit log skipped, no connection: {e}"),
    })
    .await;
    if let Err(e) = outcome {
        error!("Audit task failed: {e}");
    }
}
