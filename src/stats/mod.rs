//! Dashboard aggregates: upcoming birthdays and today's counters.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{Datelike, NaiveDate};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use crate::core::shared::enums::AppointmentStatus;
use crate::core::shared::error::ApiResult;
use crate::core::shared::models::schema::{appointments, patients, volunteers};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::parse_date;
use crate::financial::stats::load_between;
use crate::financial::FinancialStats;
use crate::security::auth_api::AuthenticatedUser;

/// Days after today still counted as "this week".
pub const BIRTHDAY_HORIZON_DAYS: u64 = 7;

pub const PATIENT_LABEL: &str = "Paciente";
pub const VOLUNTEER_LABEL: &str = "Voluntário";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BirthdayEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub date: String,
    pub formatted_date: String,
    pub is_today: bool,
    #[serde(skip)]
    next: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub active_patients: i64,
    pub active_volunteers: i64,
    pub appointments_today: i64,
    pub income_today: f64,
}

pub fn configure_stats_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/stats/birthdays", get(birthdays))
        .route("/api/v1/stats/dashboard", get(dashboard))
}

/// Next occurrence of a birthday on or after `today`. Leap-day birthdays
/// fall on 28 February in common years.
fn next_occurrence(birth: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let on_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, birth.month(), birth.day() - 1))
    };
    let this_year = on_year(today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        on_year(today.year() + 1)
    }
}

/// Selects the people whose birthday falls within the horizon, inclusive of
/// today, sorted by calendar month and day. Unparseable dates are skipped.
pub fn upcoming_birthdays<I>(people: I, today: NaiveDate) -> Vec<BirthdayEntry>
where
    I: IntoIterator<Item = (String, String, &'static str, String)>,
{
    let horizon = today + chrono::Days::new(BIRTHDAY_HORIZON_DAYS);
    let mut entries: Vec<BirthdayEntry> = people
        .into_iter()
        .filter_map(|(id, name, kind, birth_date)| {
            let next = next_occurrence(parse_date(&birth_date)?, today)?;
            if next > horizon {
                return None;
            }
            let label = next.format("%d/%m").to_string();
            Some(BirthdayEntry {
                id,
                name,
                kind,
                date: label.clone(),
                formatted_date: label,
                is_today: next == today,
                next,
            })
        })
        .collect();
    entries.sort_by_key(|e| (e.next.month(), e.next.day()));
    entries
}

pub async fn birthdays(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<Vec<BirthdayEntry>>> {
    let people = state
        .db(|conn| {
            let patient_rows: Vec<(String, String, String)> = patients::table
                .filter(patients::active.eq(true))
                .select((patients::id, patients::name, patients::birth_date))
                .load(conn)?;
            let volunteer_rows: Vec<(String, String, String)> = volunteers::table
                .filter(volunteers::active.eq(true))
                .select((volunteers::id, volunteers::name, volunteers::birth_date))
                .load(conn)?;
            Ok(patient_rows
                .into_iter()
                .map(|(id, name, bd)| (id, name, PATIENT_LABEL, bd))
                .chain(
                    volunteer_rows
                        .into_iter()
                        .map(|(id, name, bd)| (id, name, VOLUNTEER_LABEL, bd)),
                )
                .collect::<Vec<_>>())
        })
        .await?;

    let today = chrono::Local::now().date_naive();
    Ok(Json(upcoming_birthdays(people, today)))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<DashboardStats>> {
    let today = chrono::Local::now().date_naive();
    let stats = state
        .db(move |conn| {
            let active_patients = patients::table
                .filter(patients::active.eq(true))
                .count()
                .get_result(conn)?;
            let active_volunteers = volunteers::table
                .filter(volunteers::active.eq(true))
                .count()
                .get_result(conn)?;
            let appointments_today = appointments::table
                .filter(appointments::date.eq(today.format("%Y-%m-%d").to_string()))
                .filter(appointments::status.ne(AppointmentStatus::Cancelled))
                .count()
                .get_result(conn)?;
            let income_today =
                FinancialStats::from_transactions(&load_between(conn, Some(today), Some(today))?)
                    .total_income;
            Ok(DashboardStats {
                active_patients,
                active_volunteers,
                appointments_today,
                income_today,
            })
        })
        .await?;
    Ok(Json(stats))
}
