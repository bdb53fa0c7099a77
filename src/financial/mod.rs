//! Cash book: income and expense transactions, their reconciliation against
//! appointment prices, and period totals.

pub mod reconcile;
pub mod stats;
pub mod transactions;

pub use reconcile::{reconcile, reconcile_appointment};
pub use stats::FinancialStats;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub fn configure_financial_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/financial/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/api/v1/financial/transactions/detail/:id",
            get(transactions::get_transaction),
        )
        .route(
            "/api/v1/financial/transactions/:id",
            axum::routing::put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route("/api/v1/financial/stats/daily", get(stats::daily_stats))
        .route("/api/v1/financial/stats/summary", get(stats::summary_stats))
}
