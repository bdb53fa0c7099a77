use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::JsonDocument;
use crate::core::shared::models::schema::{patients, volunteers};

/// Patient row. `cpf` holds ciphertext at rest; handlers decrypt it before
/// the row leaves the service. `cpf_lookup` is the keyed blind index that
/// carries the UNIQUE constraint.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = patients)]
#[diesel(treat_none_as_null = true)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub cpf: String,
    #[serde(skip)]
    pub cpf_lookup: String,
    pub rg: Option<String>,
    pub birth_date: String,
    pub whatsapp: String,
    pub email: Option<String>,
    pub address: JsonDocument,
    pub personal_income: f64,
    pub family_income: f64,
    pub observations: Option<String>,
    pub files: JsonDocument,
    pub photo: Option<String>,
    pub active: bool,
    pub payment_table_id: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_cpf: Option<String>,
    pub guardian_phone: Option<String>,
    pub lgpd_consent: bool,
    pub lgpd_consent_date: Option<String>,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = volunteers)]
#[diesel(treat_none_as_null = true)]
pub struct Volunteer {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub birth_date: String,
    pub phone: String,
    pub specialty: String,
    pub license_number: String,
    pub availability: JsonDocument,
    pub files: JsonDocument,
    pub active: bool,
    pub appointment_duration: i32,
    pub photo: Option<String>,
    pub lgpd_consent: bool,
    pub lgpd_consent_date: Option<String>,
}
