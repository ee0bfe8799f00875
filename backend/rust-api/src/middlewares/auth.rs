use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::user::{User, UserRole};
use crate::services::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,   // user_id
    pub email: String,
    pub role: UserRole,
    /// Must match the user's stored tokenVersion
    #[serde(default)]
    pub token_version: i64,
    pub exp: usize,    // expiration timestamp
    pub iat: usize,    // issued at timestamp
}

impl JwtClaims {
    pub fn for_user(user_id: &ObjectId, user: &User, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        JwtClaims {
            sub: user_id.to_hex(),
            email: user.email.clone(),
            role: user.role,
            token_version: user.token_version,
            exp: (now + ttl_seconds) as usize,
            iat: now as usize,
        }
    }

    pub fn user_id(&self) -> Result<ObjectId, ApiError> {
        ObjectId::parse_str(&self.sub).map_err(|_| ApiError::Unauthorized("Invalid token".into()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token signature")]
    InvalidSignature,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Bearer header first, then the `auth_token` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(AUTH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Signature and expiry only; no database lookup
pub fn optional_claims(state: &AppState, headers: &HeaderMap) -> Option<JwtClaims> {
    let token = extract_token(headers)?;
    JwtService::new(&state.config.jwt_secret)
        .validate_token(&token)
        .ok()
}

/// Rejects tokens of deleted users and tokens issued before the last logout.
pub async fn ensure_token_current(state: &AppState, claims: &JwtClaims) -> Result<(), ApiError> {
    let user_id = claims.user_id()?;
    let user = state
        .mongo
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id })
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("Failed to load token user")))?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    if user.token_version != claims.token_version {
        tracing::debug!(user_id = %claims.sub, "Rejected token from before logout");
        return Err(ApiError::Unauthorized("Token has been revoked".into()));
    }
    Ok(())
}

/// Middleware verifying the JWT and storing its claims in request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers).ok_or(AuthError::MissingToken)?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(&token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        e
    })?;

    ensure_token_current(&state, &claims).await?;

    tracing::debug!("Authenticated user: {} (role: {})", claims.sub, claims.role.as_str());

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let claims = request.extensions().get::<JwtClaims>();
    if let Some(claims) = claims {
        if claims.is_admin() {
            return Ok(next.run(request).await);
        }
    }
    tracing::warn!("Access denied: admin role required");
    Err(ApiError::Forbidden("Admin access required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn claims(exp_offset: i64) -> JwtClaims {
        let now = Utc::now().timestamp();
        JwtClaims {
            sub: ObjectId::new().to_hex(),
            email: "ada@example.com".to_string(),
            role: UserRole::Admin,
            token_version: 2,
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let claims = claims(3600);

        let token = service.generate_token(&claims).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.role, UserRole::Admin);
        assert_eq!(validated.token_version, 2);
        assert!(validated.user_id().is_ok());
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let service = JwtService::new("test-secret");

        let expired = service.generate_token(&claims(-3600)).unwrap();
        assert!(matches!(
            service.validate_token(&expired),
            Err(AuthError::ExpiredToken)
        ));

        let foreign = JwtService::new("other-secret")
            .generate_token(&claims(3600))
            .unwrap();
        assert!(matches!(
            service.validate_token(&foreign),
            Err(AuthError::InvalidSignature)
        ));

        assert!(matches!(
            service.validate_token("garbage"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_extract_token_prefers_bearer_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "auth_token=from-cookie".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        assert!(extract_token(&HeaderMap::new()).is_none());
    }
}
