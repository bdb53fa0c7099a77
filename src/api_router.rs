//! Combines the resource routers of every module into the `/api/v1` tree.

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::patients::configure_patient_routes())
        .merge(crate::volunteers::configure_volunteer_routes())
        .merge(crate::appointments::configure_appointment_routes())
        .merge(crate::attendance::configure_attendance_routes())
        .merge(crate::financial::configure_financial_routes())
        .merge(crate::specialties::configure_specialty_routes())
        .merge(crate::payment_tables::configure_payment_table_routes())
        .merge(crate::forms::configure_form_routes())
        .merge(crate::settings::configure_settings_routes())
        .merge(crate::users::configure_user_routes())
        .merge(crate::audit::configure_audit_routes())
        .merge(crate::stats::configure_stats_routes())
        .merge(crate::public::configure_public_routes())
        .merge(crate::backup::configure_backup_routes())
}
