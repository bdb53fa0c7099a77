//! Appointment payment reconciliation.

use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;

use crate::core::shared::enums::{PaymentStatus, TransactionType};
use crate::core::shared::models::schema::{appointments, transactions};
use crate::core::shared::models::Transaction;

/// Tolerance for floating-point cents when comparing paid against price.
pub const PAYMENT_TOLERANCE: f64 = 0.01;

/// Folds the transactions linked to an appointment into `(amount_paid, status)`.
///
/// Income counts positive and expense (refunds) negative. A free appointment
/// is paid once any income was registered against it.
pub fn reconcile(price: f64, linked: &[Transaction]) -> (f64, PaymentStatus) {
    let (paid, has_income) = linked.iter().fold((0.0_f64, false), |(sum, income), tx| {
        match tx.kind {
            TransactionType::Income => (sum + tx.amount, true),
            TransactionType::Expense => (sum - tx.amount, income),
        }
    });

    let status = if (price > 0.0 && paid >= price - PAYMENT_TOLERANCE)
        || (price == 0.0 && has_income)
    {
        PaymentStatus::Paid
    } else if paid > 0.0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    };

    (paid, status)
}

/// Reloads the appointment's transactions and persists the folded payment
/// state. A missing appointment is ignored.
pub fn reconcile_appointment(
    conn: &mut SqliteConnection,
    appointment_id: &str,
) -> QueryResult<Option<(f64, PaymentStatus)>> {
    let price: Option<f64> = appointments::table
        .find(appointment_id)
        .select(appointments::price)
        .first(conn)
        .optional()?;
    let Some(price) = price else {
        return Ok(None);
    };

    let linked: Vec<Transaction> = transactions::table
        .filter(transactions::appointment_id.eq(appointment_id))
        .select(Transaction::as_select())
        .load(conn)?;

    let (paid, status) = reconcile(price, &linked);
    diesel::update(appointments::table.find(appointment_id))
        .set((
            appointments::amount_paid.eq(paid),
            appointments::payment_status.eq(status),
        ))
        .execute(conn)?;

    debug!("Appointment {appointment_id} reconciled: paid={paid:.2} status={status}");
    Ok(Some((paid, status)))
}
