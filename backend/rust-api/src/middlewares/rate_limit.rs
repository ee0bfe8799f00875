use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::metrics::{record_redis_operation, RATE_LIMIT_REJECTIONS_TOTAL};
use crate::services::AppState;

/// Fixed-window limit applied per client IP
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub scope: &'static str,
    pub limit: u32,
    pub window_seconds: u64,
    /// Environment variable that overrides `limit`
    pub env_override: &'static str,
}

// 10 attempts per 5 minutes
pub const LOGIN_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "login",
    limit: 10,
    window_seconds: 300,
    env_override: "RATE_LIMIT_LOGIN_ATTEMPTS",
};

// 5 signups per hour
pub const SIGNUP_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "signup",
    limit: 5,
    window_seconds: 3600,
    env_override: "RATE_LIMIT_SIGNUP_ATTEMPTS",
};

pub const SUBMISSION_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "submission",
    limit: 30,
    window_seconds: 60,
    env_override: "RATE_LIMIT_SUBMISSIONS",
};

pub const CONTACT_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "contact",
    limit: 5,
    window_seconds: 600,
    env_override: "RATE_LIMIT_CONTACT",
};

impl RateLimitPolicy {
    fn effective_limit(&self) -> u32 {
        std::env::var(self.env_override)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(self.limit)
    }
}

/// Proxy headers are honoured only with `TRUST_PROXY_HEADERS=1`; otherwise
/// the socket peer address is the client.
pub fn trust_proxy_headers() -> bool {
    matches!(
        std::env::var("TRUST_PROXY_HEADERS").as_deref(),
        Ok("1") | Ok("true")
    )
}

pub fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    extract_client_ip(headers, extensions, trust_proxy_headers())
}

pub fn extract_client_ip(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    trust_proxy: bool,
) -> String {
    if !trust_proxy {
        return peer_ip(extensions);
    }

    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            // comma separated list; take first
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            // forwarded: for=1.2.3.4; proto=http; by=...
            for part in s.split(';') {
                let p = part.trim();
                if let Some(val) = p.strip_prefix("for=") {
                    return val.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    peer_ip(extensions)
}

fn peer_ip(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

/// Counts one request against `policy` for `client_ip`. Redis failures let
/// the request through.
pub async fn enforce(
    state: &AppState,
    policy: RateLimitPolicy,
    client_ip: &str,
) -> Result<(), ApiError> {
    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(());
    }

    let key = format!("ratelimit:{}:{}", policy.scope, client_ip);
    match check_rate_limit(state, &key, policy.effective_limit(), policy.window_seconds).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!(scope = policy.scope, ip = %client_ip, "Rate limit exceeded");
            RATE_LIMIT_REJECTIONS_TOTAL
                .with_label_values(&[policy.scope])
                .inc();
            Err(ApiError::TooManyRequests(
                "Too many requests. Please try again later.".to_string(),
            ))
        }
        Err(e) => {
            tracing::warn!(scope = policy.scope, "Rate limit check skipped: {:#}", e);
            Ok(())
        }
    }
}

/// Fixed window counter: SET with expiry on first hit, INCR afterwards
async fn check_rate_limit(
    state: &AppState,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let lua_script = r#"
        local key = KEYS[1]
        local limit = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])

        local current = redis.call('GET', key)

        if current == false then
            redis.call('SET', key, 1, 'EX', window)
            return 1
        end

        current = tonumber(current)

        if current >= limit then
            return 0
        end

        redis.call('INCR', key)
        return 1
    "#;

    let result = async {
        let mut conn = state.redis_connection().await?;
        let allowed: u32 = redis::Script::new(lua_script)
            .key(key)
            .arg(limit)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok::<_, anyhow::Error>(allowed == 1)
    }
    .await;

    record_redis_operation("rate_limit", result.is_ok());
    result
}

async fn limit_by_ip(
    state: &AppState,
    policy: RateLimitPolicy,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    enforce(state, policy, &client_ip).await?;
    Ok(next.run(request).await)
}

pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit_by_ip(&state, LOGIN_POLICY, request, next).await
}

pub async fn signup_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit_by_ip(&state, SIGNUP_POLICY, request, next).await
}

pub async fn contact_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit_by_ip(&state, CONTACT_POLICY, request, next).await
}
