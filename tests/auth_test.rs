mod common;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use clinicserver::core::shared::enums::Role;
use common::{TestApp, ADMIN_PASSWORD};
use serde_json::json;
use std::net::SocketAddr;

#[tokio::test]
async fn test_health_is_public_and_hardened() {
    let app = TestApp::new();
    let res = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
    assert_eq!(res.body["database"], "connected");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();
    let res = app.send(Method::GET, "/api/v1/patients", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(Method::GET, "/api/v1/patients", Some("not-a-jwt"), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_login_json_and_form() {
    let app = TestApp::new();
    app.seed_user("recepcao", ADMIN_PASSWORD, Role::Staff);

    let res = app.login("recepcao", ADMIN_PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["token_type"], "bearer");
    assert_eq!(res.body["role"], "STAFF");
    let token = res.body["access_token"].as_str().expect("token").to_string();

    let me = app
        .send(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["role"], "STAFF");

    let form = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username=recepcao&password={ADMIN_PASSWORD}")))
        .expect("request");
    let res = app.call(form).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
}

#[tokio::test]
async fn test_wrong_credentials_are_rejected() {
    let app = TestApp::new();
    app.seed_user("recepcao", ADMIN_PASSWORD, Role::Staff);

    assert_eq!(
        app.login("recepcao", "errada").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("ninguem", ADMIN_PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_volunteer_logs_in_with_email() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let volunteer = app
        .create_volunteer(&admin, "paula@clinica.org", "senha-da-paula")
        .await;
    assert!(volunteer.get("password").is_none());

    let res = app.login("paula@clinica.org", "senha-da-paula").await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["role"], "VOLUNTEER");
    assert_eq!(res.body["user_id"], volunteer["id"]);
    assert_eq!(res.body["specialty"], "Psicologia");
}

#[tokio::test]
async fn test_inactive_volunteer_cannot_login() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let volunteer = app
        .create_volunteer(&admin, "inativa@clinica.org", "senha-inativa")
        .await;
    let id = volunteer["id"].as_str().expect("id");

    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/volunteers/{id}"),
            Some(&admin),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app.login("inativa@clinica.org", "senha-inativa").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "account_disabled");
}

fn login_attempt(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let mut request = builder
        .body(Body::from(json!({"email": "x", "password": "y"}).to_string()))
        .expect("request");
    let addr: SocketAddr = peer.parse().expect("peer addr");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn test_login_rate_limit() {
    let app = TestApp::with_env(&[("LOGIN_RATE_LIMIT_PER_MINUTE", "2")]);
    let peer = "203.0.113.7:40000";

    assert_eq!(app.call(login_attempt(peer, None)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.call(login_attempt(peer, None)).await.status, StatusCode::UNAUTHORIZED);
    let limited = app.call(login_attempt(peer, None)).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers.contains_key(header::RETRY_AFTER));

    // other peers keep their own quota
    let other = app.call(login_attempt("198.51.100.1:40000", None)).await;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rate_limit_ignores_forwarded_for() {
    let app = TestApp::with_env(&[("LOGIN_RATE_LIMIT_PER_MINUTE", "2")]);
    let peer = "203.0.113.8:40000";

    let mut limited = 0;
    for i in 0..10 {
        let forwarded = format!("10.0.0.{i}");
        let res = app.call(login_attempt(peer, Some(&forwarded))).await;
        if res.status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert_eq!(limited, 8);
}
