use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::transactions::query_date;
use crate::core::shared::enums::TransactionType;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::schema::transactions;
use crate::core::shared::models::Transaction;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{day_end_exclusive, day_start};
use crate::security::auth_api::AuthenticatedUser;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStats {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub transaction_count: usize,
    /// Income per payment method; expenses are not broken down.
    pub by_method: BTreeMap<String, f64>,
}

impl FinancialStats {
    pub fn from_transactions(rows: &[Transaction]) -> Self {
        let mut stats = Self {
            transaction_count: rows.len(),
            ..Self::default()
        };
        for tx in rows {
            match tx.kind {
                TransactionType::Income => {
                    stats.total_income += tx.amount;
                    *stats
                        .by_method
                        .entry(tx.payment_method.as_str().to_string())
                        .or_insert(0.0) += tx.amount;
                }
                TransactionType::Expense => stats.total_expense += tx.amount,
            }
        }
        stats.balance = stats.total_income - stats.total_expense;
        stats
    }
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub target_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub(crate) fn load_between(
    conn: &mut SqliteConnection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> QueryResult<Vec<Transaction>> {
    let mut q = transactions::table.into_boxed();
    if let Some(day) = start {
        q = q.filter(transactions::date.ge(day_start(day)));
    }
    if let Some(day) = end {
        q = q.filter(transactions::date.lt(day_end_exclusive(day)));
    }
    q.select(Transaction::as_select()).load(conn)
}

pub async fn daily_stats(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<DailyQuery>,
) -> ApiResult<Json<FinancialStats>> {
    let day = query_date(query.target_date.as_deref(), "target_date")?
        .ok_or_else(|| ApiError::BadRequest("target_date is required".to_string()))?;

    let rows = state
        .db(move |conn| Ok(load_between(conn, Some(day), Some(day))?))
        .await?;
    Ok(Json(FinancialStats::from_transactions(&rows)))
}

pub async fn summary_stats(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<FinancialStats>> {
    let start = query_date(query.start_date.as_deref(), "start_date")?;
    let end = query_date(query.end_date.as_deref(), "end_date")?;

    let rows = state
        .db(move |conn| Ok(load_between(conn, start, end)?))
        .await?;
    Ok(Json(FinancialStats::from_transactions(&rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::PaymentMethod;
    use crate::core::shared::utils::now;

    fn tx(kind: TransactionType, method: PaymentMethod, amount: f64) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            kind,
            date: now(),
            description: String::new(),
            patient_id: None,
            appointment_id: None,
            payment_method: method,
            created_at: now(),
            created_by: None,
        }
    }

    #[test]
    fn test_stats_only_break_down_income() {
        let rows = vec![
            tx(TransactionType::Income, PaymentMethod::Pix, 80.0),
            tx(TransactionType::Income, PaymentMethod::Pix, 20.0),
            tx(TransactionType::Income, PaymentMethod::Cash, 50.0),
            tx(TransactionType::Expense, PaymentMethod::Card, 30.0),
        ];
        let stats = FinancialStats::from_transactions(&rows);
        assert_eq!(stats.transaction_count, 4);
        assert_eq!(stats.total_income, 150.0);
        assert_eq!(stats.total_expense, 30.0);
        assert_eq!(stats.balance, 120.0);
        assert_eq!(stats.by_method.get("PIX"), Some(&100.0));
        assert_eq!(stats.by_method.get("DINHEIRO"), Some(&50.0));
        assert!(!stats.by_method.contains_key("CARTAO"));
    }

    #[test]
    fn test_empty_stats() {
        let stats = FinancialStats::from_transactions(&[]);
        assert_eq!(stats, FinancialStats::default());
    }
}
