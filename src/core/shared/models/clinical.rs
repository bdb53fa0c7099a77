use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::{AppointmentStatus, JsonDocument, PaymentStatus};
use crate::core::shared::models::schema::{
    appointments, form_templates, medical_records, specialties,
};

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = appointments)]
#[diesel(treat_none_as_null = true)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub volunteer_id: Option<String>,
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub price: f64,
    pub amount_paid: f64,
    pub payment_status: PaymentStatus,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = medical_records)]
#[diesel(treat_none_as_null = true)]
pub struct MedicalRecord {
    pub id: String,
    pub appointment_id: String,
    pub patient_id: String,
    pub volunteer_id: String,
    pub chief_complaint: String,
    pub history: String,
    pub procedures: Option<String>,
    pub prescription: Option<String>,
    pub content: JsonDocument,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = specialties)]
pub struct Specialty {
    pub id: String,
    pub name: String,
    pub anamnesis_type: String,
}

impl Specialty {
    pub const DEFAULT_ANAMNESIS: &'static str = "general";
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = form_templates)]
#[diesel(treat_none_as_null = true)]
pub struct FormTemplate {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub form_type: String,
    pub schema_config: JsonDocument,
    pub specialties: JsonDocument,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub active: bool,
}

impl FormTemplate {
    pub fn applies_to(&self, specialty: &str) -> bool {
        match self.specialties.0.as_array() {
            Some(list) if !list.is_empty() => list
                .iter()
                .filter_map(|v| v.as_str())
                .any(|s| s.eq_ignore_ascii_case(specialty)),
            _ => true,
        }
    }
}
