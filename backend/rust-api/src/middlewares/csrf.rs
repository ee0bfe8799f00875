use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

use crate::error::ApiError;

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// CSRF middleware using double-submit cookie pattern
///
/// State-changing requests must carry the `csrf_token` cookie and an
/// identical `X-CSRF-Token` header. Safe methods pass through.
pub async fn csrf_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let method = request.method();
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let cookie_token = CookieJar::from_headers(request.headers())
        .get(CSRF_COOKIE_NAME)
        .map(|c| c.value().to_string());

    let header_token = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match (cookie_token, header_token) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => {
            tracing::debug!("CSRF validation passed");
            Ok(next.run(request).await)
        }
        (None, _) => {
            tracing::warn!("CSRF validation failed: missing cookie token");
            Err(ApiError::Forbidden("Missing CSRF token".into()))
        }
        (_, None) => {
            tracing::warn!("CSRF validation failed: missing header token");
            Err(ApiError::Forbidden("Missing CSRF token".into()))
        }
        _ => {
            tracing::warn!("CSRF validation failed: token mismatch");
            Err(ApiError::Forbidden("Invalid CSRF token".into()))
        }
    }
}

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Cookie half of the double submit; the client echoes the value in a header.
pub fn csrf_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE_NAME, token))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::StatusCode, routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/change", post(|| async { "changed" }))
            .layer(axum::middleware::from_fn(csrf_middleware))
    }

    #[test]
    fn test_generate_csrf_token() {
        let token1 = generate_csrf_token();
        let token2 = generate_csrf_token();

        assert!(!token1.is_empty());
        assert_ne!(token1, token2);
        assert!(general_purpose::URL_SAFE_NO_PAD.decode(&token1).is_ok());
    }

    #[test]
    fn test_csrf_cookie_attributes() {
        let cookie = csrf_cookie("abc".into(), true);
        assert_eq!(cookie.name(), CSRF_COOKIE_NAME);
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[tokio::test]
    async fn test_matching_tokens_pass() {
        let response = app()
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/change")
                    .header("cookie", "csrf_token=tok123")
                    .header(CSRF_HEADER_NAME, "tok123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_mismatched_tokens_forbidden() {
        let missing = app()
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/change")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::FORBIDDEN);

        let mismatched = app()
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/change")
                    .header("cookie", "csrf_token=tok123")
                    .header(CSRF_HEADER_NAME, "other")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(mismatched.status(), StatusCode::FORBIDDEN);
    }
}
