use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::{PaymentMethod, TransactionType};
use crate::core::shared::models::schema::{payment_tables, transactions};

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = transactions)]
#[diesel(treat_none_as_null = true)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDateTime,
    pub description: String,
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = payment_tables)]
pub struct PaymentTable {
    pub id: String,
    pub name: String,
    pub value: f64,
}
