use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::ApiResult,
    middlewares::auth::JwtClaims,
    models::{response::ResponseView, survey::SurveyView},
    services::{response_service::ResponseService, AppState},
    utils::parse_object_id,
};

const INVALID_RESPONSE_ID: &str = "Invalid response ID";

/// GET /api/responses/recent
pub async fn recent_responses(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let responses = ResponseService::new(state.mongo.clone()).recent().await?;
    Ok(Json(json!({ "success": true, "responses": responses })))
}

/// GET /api/responses/{id} - only for the owner of the survey
pub async fn get_response(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let response_id = parse_object_id(&id, INVALID_RESPONSE_ID)?;

    let (response, survey) = ResponseService::new(state.mongo.clone())
        .get_owned(response_id, claims.user_id()?)
        .await?;

    Ok(Json(json!({
        "response": ResponseView::from(response),
        "survey": SurveyView::from(survey),
    })))
}

/// DELETE /api/responses/{id}
pub async fn delete_response(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let response_id = parse_object_id(&id, INVALID_RESPONSE_ID)?;

    ResponseService::new(state.mongo.clone())
        .delete_owned(response_id, claims.user_id()?)
        .await?;

    Ok(Json(json!({ "message": "Response deleted successfully" })))
}
