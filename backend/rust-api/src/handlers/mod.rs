use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let mongo_health = check_mongodb(&state).await;
    let mongo_ok = mongo_health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    dependencies.insert("mongodb".to_string(), json!(mongo_health));

    // Redis only backs rate limits and lockout, so it never fails the check
    let redis_health = check_redis(&state).await;
    let redis_ok = redis_health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    dependencies.insert("redis".to_string(), json!(redis_health));

    let (status_code, status) = match (mongo_ok, redis_ok) {
        (true, true) => (StatusCode::OK, "healthy"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "survey-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_mongodb(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "MongoDB health check failed");
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("MongoDB error"));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("MongoDB timeout after 1s"));
        }
    }

    result
}

async fn check_redis(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    let ping = async {
        let mut conn = state.redis_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(anyhow::Error::from)
    };

    match ping.await {
        Ok(_) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis health check failed");
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("Redis unavailable"));
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic Auth against `METRICS_AUTH` (user:password)
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod analytics;
pub mod auth;
pub mod contact;
pub mod responses;
pub mod surveys;
pub mod templates;
