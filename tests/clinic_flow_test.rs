mod common;

use axum::http::{Method, StatusCode};
use clinicserver::core::shared::enums::Role;
use clinicserver::core::shared::models::schema::patients;
use common::TestApp;
use diesel::prelude::*;
use serde_json::json;

const SLOT: (&str, &str) = ("2030-03-04", "09:00");

fn id_of(value: &serde_json::Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn test_cpf_is_encrypted_at_rest_and_unique() {
    let app = TestApp::new();
    let (_, staff) = app.token_for("recepcao", Role::Staff);

    let patient = app.create_patient(&staff, "João da Silva", "123.456.789-00").await;
    assert_eq!(patient["cpf"], "123.456.789-00");
    assert!(patient.get("cpf_lookup").is_none());
    let id = id_of(&patient);

    let stored: String = {
        let mut conn = app.state.conn.get().expect("conn");
        patients::table
            .find(&id)
            .select(patients::cpf)
            .first(&mut conn)
            .expect("row")
    };
    assert!(stored.starts_with("enc1:"));
    assert!(!stored.contains("123.456.789-00"));

    let dup = app
        .send(
            Method::POST,
            "/api/v1/patients",
            Some(&staff),
            Some(json!({
                "name": "Outro João",
                "cpf": "123.456.789-00",
                "birth_date": "1990-01-01",
                "whatsapp": "11900000000",
            })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patient_soft_delete_and_anonymize() {
    let app = TestApp::new();
    let (_, staff) = app.token_for("recepcao", Role::Staff);
    let first = id_of(&app.create_patient(&staff, "Maria", "111.111.111-11").await);
    let second = id_of(&app.create_patient(&staff, "Carla", "222.222.222-22").await);

    let res = app
        .send(Method::DELETE, &format!("/api/v1/patients/{first}"), Some(&staff), None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send(Method::GET, &format!("/api/v1/patients/{first}"), Some(&staff), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let list = app.send(Method::GET, "/api/v1/patients", Some(&staff), None).await;
    let ids: Vec<_> = list.body.as_array().expect("array").iter().map(id_of).collect();
    assert_eq!(ids, vec![second.clone()]);

    let res = app
        .send(
            Method::POST,
            &format!("/api/v1/patients/{second}/anonymize"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_ne!(res.body["name"], "Carla");
    assert_ne!(res.body["cpf"], "222.222.222-22");
    assert_eq!(res.body["active"], false);
}

#[tokio::test]
async fn test_double_booking_is_rejected() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Ana", "333.333.333-33").await);
    let other = id_of(&app.create_patient(&admin, "Bia", "444.444.444-44").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "v1@clinica.org", "senha-v1").await);

    let res = app.book(&admin, &patient, &volunteer, SLOT, 80.0).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "scheduled");
    assert_eq!(res.body["payment_status"], "PENDING");

    let res = app.book(&admin, &other, &volunteer, SLOT, 80.0).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.book(&admin, &other, &volunteer, (SLOT.0, "10:00"), 80.0).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.book(&admin, &other, &volunteer, ("04/03/2030", "11:00"), 80.0).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payments_reconcile_appointment() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Ana", "555.555.555-55").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "v2@clinica.org", "senha-v2").await);
    let appt = id_of(&app.book(&admin, &patient, &volunteer, SLOT, 100.0).await.body);

    let pay = |amount: f64| {
        json!({
            "amount": amount,
            "type": "INCOME",
            "description": "Consulta",
            "patient_id": patient,
            "appointment_id": appt,
            "payment_method": "PIX",
        })
    };

    let first = app
        .send(Method::POST, "/api/v1/financial/transactions", Some(&admin), Some(pay(40.0)))
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);

    let view = app
        .send(Method::GET, &format!("/api/v1/appointments/{appt}"), Some(&admin), None)
        .await;
    assert_eq!(view.body["payment_status"], "PARTIAL");
    assert_eq!(view.body["amount_paid"], 40.0);

    let second = app
        .send(Method::POST, "/api/v1/financial/transactions", Some(&admin), Some(pay(60.0)))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let view = app
        .send(Method::GET, &format!("/api/v1/appointments/{appt}"), Some(&admin), None)
        .await;
    assert_eq!(view.body["payment_status"], "PAID");

    let tx = id_of(&second.body);
    let res = app
        .send(
            Method::DELETE,
            &format!("/api/v1/financial/transactions/{tx}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["ok"], true);

    let view = app
        .send(Method::GET, &format!("/api/v1/appointments/{appt}"), Some(&admin), None)
        .await;
    assert_eq!(view.body["payment_status"], "PARTIAL");

    // client-sent payment fields are ignored
    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/appointments/{appt}"),
            Some(&admin),
            Some(json!({ "amount_paid": 100.0, "payment_status": "PAID", "notes": "retorno" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["payment_status"], "PARTIAL");
    assert_eq!(res.body["notes"], "retorno");

    let summary = app
        .send(Method::GET, "/api/v1/financial/stats/summary", Some(&admin), None)
        .await;
    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.body["total_income"], 40.0);
}

#[tokio::test]
async fn test_volunteer_only_touches_own_agenda() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Rita", "666.666.666-66").await);
    let owner = id_of(&app.create_volunteer(&admin, "dona@clinica.org", "senha-dona").await);
    app.create_volunteer(&admin, "outra@clinica.org", "senha-outra").await;
    let appt = id_of(&app.book(&admin, &patient, &owner, SLOT, 0.0).await.body);

    let owner_token = app.login("dona@clinica.org", "senha-dona").await.body["access_token"]
        .as_str()
        .expect("token")
        .to_string();
    let other_token = app.login("outra@clinica.org", "senha-outra").await.body["access_token"]
        .as_str()
        .expect("token")
        .to_string();

    let agenda = app
        .send(Method::GET, "/api/v1/attendance/my-appointments", Some(&owner_token), None)
        .await;
    assert_eq!(agenda.status, StatusCode::OK);
    assert_eq!(agenda.body[0]["patient_name"], "Rita");

    let res = app
        .send(
            Method::POST,
            &format!("/api/v1/attendance/{appt}/start"),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(Method::GET, "/api/v1/attendance/my-appointments", Some(&admin), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(
            Method::POST,
            &format!("/api/v1/attendance/{appt}/start"),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["status"], "in_progress");

    let finish = json!({
        "chief_complaint": "Ansiedade",
        "history": "Relata insônia há 3 meses",
        "content": { "humor": "ansioso" },
    });
    let res = app
        .send(
            Method::POST,
            &format!("/api/v1/attendance/{appt}/finish"),
            Some(&owner_token),
            Some(finish),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["chief_complaint"], "Ansiedade");

    let history = app
        .send(
            Method::GET,
            &format!("/api/v1/attendance/patient/{patient}/history"),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.body.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["appointment_date"], SLOT.0);
}

#[tokio::test]
async fn test_volunteer_with_appointments_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Lia", "777.777.777-77").await);
    let busy = id_of(&app.create_volunteer(&admin, "ocupada@clinica.org", "senha-1").await);
    let free = id_of(&app.create_volunteer(&admin, "livre@clinica.org", "senha-2").await);
    app.book(&admin, &patient, &busy, SLOT, 0.0).await;

    let res = app
        .send(Method::DELETE, &format!("/api/v1/volunteers/{busy}"), Some(&admin), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .send(Method::DELETE, &format!("/api/v1/volunteers/{free}"), Some(&admin), None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_rescheduling_into_taken_slot_is_rejected() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let ana = id_of(&app.create_patient(&admin, "Ana", "121.121.121-12").await);
    let bia = id_of(&app.create_patient(&admin, "Bia", "131.131.131-13").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "slot@clinica.org", "senha-slot").await);

    let first = id_of(&app.book(&admin, &ana, &volunteer, SLOT, 0.0).await.body);
    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/appointments/{first}"),
            Some(&admin),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app.book(&admin, &bia, &volunteer, SLOT, 0.0).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/appointments/{first}"),
            Some(&admin),
            Some(json!({ "status": "scheduled" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let slot = app
        .send(
            Method::GET,
            &format!("/api/v1/appointments?volunteer_id={volunteer}&date={}", SLOT.0),
            Some(&admin),
            None,
        )
        .await;
    let scheduled = slot
        .body
        .as_array()
        .expect("array")
        .iter()
        .filter(|a| a["status"] == "scheduled")
        .count();
    assert_eq!(scheduled, 1);
}

#[tokio::test]
async fn test_cancelled_attendance_cannot_double_book() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let ana = id_of(&app.create_patient(&admin, "Ana", "141.141.141-14").await);
    let bia = id_of(&app.create_patient(&admin, "Bia", "151.151.151-15").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "agenda@clinica.org", "senha-ag").await);
    let token = app.login("agenda@clinica.org", "senha-ag").await.body["access_token"]
        .as_str()
        .expect("token")
        .to_string();

    let first = id_of(&app.book(&admin, &ana, &volunteer, SLOT, 0.0).await.body);
    let res = app
        .send(Method::POST, &format!("/api/v1/attendance/{first}/start"), Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    // the slot frees up while the first consultation is in progress
    let res = app.book(&admin, &bia, &volunteer, SLOT, 0.0).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app
        .send(Method::POST, &format!("/api/v1/attendance/{first}/cancel"), Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let view = app
        .send(Method::GET, &format!("/api/v1/appointments/{first}"), Some(&admin), None)
        .await;
    assert_eq!(view.body["status"], "in_progress");
}

#[tokio::test]
async fn test_deleting_appointment_removes_linked_rows() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Clara", "161.161.161-16").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "clara@clinica.org", "senha-cl").await);
    let token = app.login("clara@clinica.org", "senha-cl").await.body["access_token"]
        .as_str()
        .expect("token")
        .to_string();
    let appt = id_of(&app.book(&admin, &patient, &volunteer, SLOT, 50.0).await.body);

    let res = app
        .send(
            Method::POST,
            "/api/v1/financial/transactions",
            Some(&admin),
            Some(json!({
                "amount": 50.0,
                "type": "INCOME",
                "description": "Consulta",
                "patient_id": patient,
                "appointment_id": appt,
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let res = app
        .send(
            Method::POST,
            &format!("/api/v1/attendance/{appt}/finish"),
            Some(&token),
            Some(json!({ "chief_complaint": "Dor lombar", "history": "Há duas semanas" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app
        .send(Method::DELETE, &format!("/api/v1/appointments/{appt}"), Some(&admin), None)
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send(Method::GET, &format!("/api/v1/appointments/{appt}"), Some(&admin), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let txs = app
        .send(
            Method::GET,
            &format!("/api/v1/financial/transactions?appointment_id={appt}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(txs.status, StatusCode::OK);
    assert!(txs.body.as_array().expect("array").is_empty());

    let history = app
        .send(
            Method::GET,
            &format!("/api/v1/attendance/patient/{patient}/history"),
            Some(&admin),
            None,
        )
        .await;
    assert!(history.body.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn test_moving_transaction_reconciles_both_appointments() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let patient = id_of(&app.create_patient(&admin, "Davi", "171.171.171-17").await);
    let volunteer = id_of(&app.create_volunteer(&admin, "davi@clinica.org", "senha-dv").await);
    let from = id_of(&app.book(&admin, &patient, &volunteer, SLOT, 100.0).await.body);
    let to = id_of(&app.book(&admin, &patient, &volunteer, (SLOT.0, "10:00"), 100.0).await.body);

    let tx = app
        .send(
            Method::POST,
            "/api/v1/financial/transactions",
            Some(&admin),
            Some(json!({
                "amount": 40.0,
                "type": "INCOME",
                "description": "Sinal",
                "appointment_id": from,
            })),
        )
        .await;
    assert_eq!(tx.status, StatusCode::OK, "{}", tx.body);
    let tx = id_of(&tx.body);

    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/financial/transactions/{tx}"),
            Some(&admin),
            Some(json!({ "appointment_id": to })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let old = app
        .send(Method::GET, &format!("/api/v1/appointments/{from}"), Some(&admin), None)
        .await;
    assert_eq!(old.body["amount_paid"], 0.0);
    assert_eq!(old.body["payment_status"], "PENDING");

    let new = app
        .send(Method::GET, &format!("/api/v1/appointments/{to}"), Some(&admin), None)
        .await;
    assert_eq!(new.body["amount_paid"], 40.0);
    assert_eq!(new.body["payment_status"], "PARTIAL");
}
