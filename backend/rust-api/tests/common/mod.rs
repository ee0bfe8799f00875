#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::Value;
use std::sync::Arc;
use survey_api::{
    config::Config,
    create_router,
    models::user::{User, UserRole},
    services::AppState,
};
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "admin-pass-123";

fn init_test_env() -> Config {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    std::env::set_var("SKIP_ROOT_ENV", "1");
    std::env::set_var("RATE_LIMIT_DISABLED", "1");
    dotenvy::from_filename(".env.test").ok();

    let mut config = Config::load().expect("Failed to load test configuration");
    if std::env::var("MONGODB_DB").is_err() {
        config.mongo_database = "survey_api_test".to_string();
    }
    config
}

async fn build_app(config: Config) -> Router {
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Invalid test MongoDB URI");
    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .expect("Failed to initialize test app state"),
    );
    create_router(app_state)
}

/// App wired to the configured MongoDB and Redis.
pub async fn create_test_app() -> Router {
    build_app(init_test_env()).await
}

/// App whose MongoDB and Redis are unreachable. Only paths rejected before
/// any store call can succeed against it.
pub async fn create_offline_app() -> Router {
    let mut config = init_test_env();
    config.mongo_uri = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=300".to_string();
    config.redis_uri = "redis://127.0.0.1:1/0".to_string();
    config.llm.api_key = None;
    build_app(config).await
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Adds a bearer token and a matching CSRF cookie/header pair.
pub fn authorized(mut request: Request<Body>, token: &str) -> Request<Body> {
    let csrf = "test-csrf-token";
    let headers = request.headers_mut();
    headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    headers.insert(header::COOKIE, format!("csrf_token={}", csrf).parse().unwrap());
    headers.insert("x-csrf-token", csrf.parse().unwrap());
    request
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&body).to_string())
        })
    };
    (status, value)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, ObjectId::new().to_hex())
}

/// Inserts an admin account directly; signup only ever creates plain users.
pub async fn seed_admin(email: &str) {
    let config = init_test_env();
    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Invalid test MongoDB URI");
    let users = client
        .database(&config.mongo_database)
        .collection::<User>("users");

    users
        .delete_many(doc! { "email": email })
        .await
        .expect("Failed to clean test admin");

    let now = Utc::now();
    users
        .insert_one(User {
            id: None,
            email: email.to_string(),
            password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).unwrap(),
            name: "Test Admin".to_string(),
            role: UserRole::Admin,
            token_version: 0,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("Failed to seed test admin");
}

/// Logs in and returns the issued token.
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            &serde_json::json!({ "email": email, "password": password }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}
