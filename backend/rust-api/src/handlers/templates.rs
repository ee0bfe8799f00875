use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::template::{CreateTemplateRequest, TemplateView},
    services::{
        template_service::{built_in_templates, TemplateService},
        AppState,
    },
};

/// GET /api/templates - the caller's stored templates, then the bundled ones
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<impl IntoResponse> {
    let stored = TemplateService::new(state.mongo.clone())
        .list_for_owner(claims.user_id()?)
        .await?;

    let templates: Vec<TemplateView> = stored
        .into_iter()
        .chain(built_in_templates().iter().cloned())
        .map(TemplateView::from)
        .collect();

    Ok(Json(json!({ "templates": templates })))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateTemplateRequest>,
) -> ApiResult<impl IntoResponse> {
    let template = TemplateService::new(state.mongo.clone())
        .create(claims.user_id()?, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "template": TemplateView::from(template) })),
    ))
}

/// GET /api/templates/{templateId}
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let template = TemplateService::new(state.mongo.clone())
        .get(&template_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".into()))?;

    Ok(Json(json!({ "success": true, "template": TemplateView::from(template) })))
}
