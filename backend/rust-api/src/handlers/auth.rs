use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, ClientMeta},
    middlewares::{
        auth::{JwtClaims, JwtService, AUTH_COOKIE},
        csrf::{csrf_cookie, generate_csrf_token},
    },
    models::user::{LoginRequest, SignupRequest, UserProfile, VerifyRequest},
    services::{auth_service::AuthService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.mongo.clone(),
        state.redis.clone(),
        JwtService::new(&state.config.jwt_secret),
        state.config.jwt_ttl_seconds,
    )
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(state.config.jwt_ttl_seconds))
        .build()
}

/// GET /api/auth/csrf-token - token in the body and as a readable cookie
pub async fn get_csrf_token(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    tracing::debug!("Generating CSRF token");

    let token = generate_csrf_token();
    let jar = jar.add(csrf_cookie(token.clone(), state.config.cookie_secure));

    (jar, Json(json!({ "csrfToken": token })))
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    tracing::info!("Registering new user: {}", req.email);
    let response = auth_service(&state).signup(req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login - token in the body and in the `auth_token` cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientMeta(client): ClientMeta,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let ip = client.ip_address.unwrap_or_else(|| "unknown".to_string());
    let response = auth_service(&state).login(req, &ip).await?;

    let jar = jar.add(session_cookie(&state, response.token.clone()));
    Ok((jar, Json(response)))
}

/// POST /api/auth/verify - checks signature and expiry of a token
pub async fn verify(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<VerifyRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.token.trim().is_empty() {
        return Err(ApiError::BadRequest("Token is required".into()));
    }

    let claims = JwtService::new(&state.config.jwt_secret)
        .validate_token(req.token.trim())
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

    Ok(Json(json!({
        "valid": true,
        "user": {
            "userId": claims.sub,
            "email": claims.email,
            "role": claims.role,
        }
    })))
}

/// GET /api/auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<impl IntoResponse> {
    let user = auth_service(&state).get_user(claims.user_id()?).await?;
    Ok(Json(json!({ "user": UserProfile::from(user) })))
}

/// POST /api/auth/logout - revokes every token of the user and clears the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    auth_service(&state).logout(claims.user_id()?).await?;

    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    Ok((
        jar,
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    ))
}
