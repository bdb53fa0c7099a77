#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use diesel::prelude::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use clinicserver::core::shared::enums::Role;
use clinicserver::core::shared::models::schema::users;
use clinicserver::core::shared::models::NewUser;
use clinicserver::core::shared::utils::{create_conn, run_migrations};
use clinicserver::security::password::hash_password;
use clinicserver::{build_router, AppConfig, AppState};

pub const ADMIN_PASSWORD: &str = "admin-senha-forte";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    pub fn with_env(extra: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("clinica.db").to_string_lossy().into_owned();
        let backup_dir = dir.path().join("backups").to_string_lossy().into_owned();

        let mut vars: Vec<(String, String)> = vec![
            ("DATABASE_URL".into(), db_path),
            ("DATABASE_POOL_SIZE".into(), "4".into()),
            ("BACKUP_DIR".into(), backup_dir),
            (
                "JWT_SECRET".into(),
                "integration-test-secret-0123456789abcdef".into(),
            ),
            ("ENCRYPTION_KEY".into(), "5c".repeat(32)),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let config = AppConfig::from_lookup(|key| {
            vars.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .expect("config");
        let pool = create_conn(&config.database).expect("pool");
        run_migrations(&pool).expect("migrations");
        let state = Arc::new(AppState::new(pool, config).expect("state"));
        let (router, _limiter) = build_router(Arc::clone(&state));

        Self { router, state, dir }
    }

    /// Inserts a system user and returns its id.
    pub fn seed_user(&self, username: &str, password: &str, role: Role) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut conn = self.state.conn.get().expect("conn");
        diesel::insert_into(users::table)
            .values(&NewUser {
                id: id.clone(),
                name: format!("Usuário {username}"),
                username: username.to_string(),
                password: hash_password(password).expect("hash"),
                role,
                avatar: None,
                volunteer_id: None,
            })
            .execute(&mut conn)
            .expect("insert user");
        id
    }

    /// Bearer token for a freshly seeded user with the given role.
    pub fn token_for(&self, username: &str, role: Role) -> (String, String) {
        let id = self.seed_user(username, ADMIN_PASSWORD, role);
        let token = self
            .state
            .jwt
            .issue(&id, role, username, None)
            .expect("token");
        (id, token)
    }

    pub fn admin_token(&self) -> String {
        self.token_for("admin", Role::Admin).1
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.call(request).await
    }

    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes()
            .to_vec();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }

    pub async fn create_patient(&self, token: &str, name: &str, cpf: &str) -> Value {
        let res = self
            .send(
                Method::POST,
                "/api/v1/patients",
                Some(token),
                Some(json!({
                    "name": name,
                    "cpf": cpf,
                    "birth_date": "1988-04-12",
                    "whatsapp": "11912345678",
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        res.body
    }

    pub async fn create_volunteer(&self, token: &str, email: &str, password: &str) -> Value {
        let res = self
            .send(
                Method::POST,
                "/api/v1/volunteers",
                Some(token),
                Some(json!({
                    "name": format!("Voluntária {email}"),
                    "email": email,
                    "password": password,
                    "birth_date": "1979-09-30",
                    "phone": "11955554444",
                    "specialty": "Psicologia",
                    "license_number": "CRP-06/1234",
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        res.body
    }

    pub async fn login(&self, login: &str, password: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": login, "password": password })),
        )
        .await
    }

    pub async fn book(
        &self,
        token: &str,
        patient_id: &str,
        volunteer_id: &str,
        slot: (&str, &str),
        price: f64,
    ) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/appointments",
            Some(token),
            Some(json!({
                "patient_id": patient_id,
                "volunteer_id": volunteer_id,
                "date": slot.0,
                "time": slot.1,
                "price": price,
            })),
        )
        .await
    }
}
