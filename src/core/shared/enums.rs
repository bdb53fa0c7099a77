//! Database enum types.
//!
//! Every enum is stored as TEXT so rows stay readable from the sqlite shell
//! and match the values the front-end already sends.

use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteValue};
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};

macro_rules! impl_text_sql {
    ($ty:ty) => {
        impl ToSql<Text, Sqlite> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $ty {
            fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
                value.parse::<$ty>().map_err(Into::into)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ============================================================================
// ROLE
// ============================================================================

/// Access role carried in the JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Volunteer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
            Self::Volunteer => "VOLUNTEER",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "STAFF" => Ok(Self::Staff),
            "VOLUNTEER" => Ok(Self::Volunteer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl_text_sql!(Role);

// ============================================================================
// APPOINTMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    NotStarted,
    InProgress,
    Finished,
    Cancelled,
    Absent,
    Confirmed,
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Absent => "absent",
            Self::Confirmed => "confirmed",
        }
    }

    /// Statuses a volunteer still sees on their agenda.
    pub fn agenda() -> [Self; 5] {
        [
            Self::Scheduled,
            Self::NotStarted,
            Self::InProgress,
            Self::Finished,
            Self::Confirmed,
        ]
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "finished" => Ok(Self::Finished),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "absent" => Ok(Self::Absent),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(format!("Unknown appointment status: {}", s)),
        }
    }
}

impl_text_sql!(AppointmentStatus);

// ============================================================================
// PAYMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Partial => "PARTIAL",
            Self::Paid => "PAID",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PARTIAL" => Ok(Self::Partial),
            "PAID" => Ok(Self::Paid),
            _ => Err(format!("Unknown payment status: {}", s)),
        }
    }
}

impl_text_sql!(PaymentStatus);

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl_text_sql!(TransactionType);

// ============================================================================
// PAYMENT METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum PaymentMethod {
    #[serde(rename = "DINHEIRO")]
    Cash,
    #[serde(rename = "PIX")]
    Pix,
    #[serde(rename = "CARTAO")]
    Card,
    #[serde(rename = "OUTRO")]
    Other,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Cash
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "DINHEIRO",
            Self::Pix => "PIX",
            Self::Card => "CARTAO",
            Self::Other => "OUTRO",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DINHEIRO" => Ok(Self::Cash),
            "PIX" => Ok(Self::Pix),
            "CARTAO" => Ok(Self::Card),
            "OUTRO" => Ok(Self::Other),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

impl_text_sql!(PaymentMethod);

// ============================================================================
// BACKUP FREQUENCY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum BackupFrequency {
    Manual,
    Daily,
    Weekly,
}

impl Default for BackupFrequency {
    fn default() -> Self {
        Self::Manual
    }
}

impl BackupFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for BackupFrequency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            _ => Err(format!("Unknown backup frequency: {}", s)),
        }
    }
}

impl_text_sql!(BackupFrequency);

// ============================================================================
// JSON DOCUMENT COLUMN
// ============================================================================

/// Free-form JSON stored in a TEXT column (addresses, file lists, form schemas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct JsonDocument(pub serde_json::Value);

impl JsonDocument {
    pub fn empty_object() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }

    pub fn empty_array() -> Self {
        Self(serde_json::Value::Array(Vec::new()))
    }
}

impl From<serde_json::Value> for JsonDocument {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl ToSql<Text, Sqlite> for JsonDocument {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(serde_json::to_string(&self.0)?);
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for JsonDocument {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(Self(serde_json::from_str(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("volunteer".parse::<Role>(), Ok(Role::Volunteer));
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_appointment_status_roundtrip() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::NotStarted,
            AppointmentStatus::InProgress,
            AppointmentStatus::Finished,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Absent,
            AppointmentStatus::Confirmed,
        ] {
            assert_eq!(status.as_str().parse::<AppointmentStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_payment_method_serde_names() {
        let json = serde_json::to_string(&PaymentMethod::Card).expect("serialize");
        assert_eq!(json, "\"CARTAO\"");
        let parsed: PaymentMethod = serde_json::from_str("\"PIX\"").expect("deserialize");
        assert_eq!(parsed, PaymentMethod::Pix);
    }

    #[test]
    fn test_agenda_excludes_cancelled_and_absent() {
        let agenda = AppointmentStatus::agenda();
        assert!(!agenda.contains(&AppointmentStatus::Cancelled));
        assert!(!agenda.contains(&AppointmentStatus::Absent));
    }
}
