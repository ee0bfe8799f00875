use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use std::convert::Infallible;

use crate::error::ApiError;
use crate::middlewares::rate_limit::extract_client_ip_from;
use crate::services::collector::ClientInfo;

/// JSON extractor whose rejections use the API's `{ "error": .. }` shape
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Invalid request body: {}", rejection.body_text());
                tracing::warn!("{}", message);
                Err(ApiError::BadRequest(message))
            }
        }
    }
}

/// Client address (proxy headers first, then the socket) and user agent
pub struct ClientMeta(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta(ClientInfo {
            ip_address: Some(extract_client_ip_from(&parts.headers, &parts.extensions)),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }))
    }
}
