use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::analytics::NarrativeRequest,
    services::{
        analytics::{aggregate_questions, AnalyticsService},
        narrative_service::{NarrativeError, NarrativeService},
        survey_service::SurveyService,
        AppState,
    },
    utils::parse_object_id,
};

/// GET /api/surveys/{id}/analytics
pub async fn survey_analytics(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, "Invalid survey ID")?;

    let analytics = AnalyticsService::new(state.mongo.clone())
        .survey_analytics(survey_id, claims.user_id()?)
        .await?
        .ok_or_else(|| ApiError::NotFound("Survey not found or access denied".into()))?;

    Ok(Json(json!({ "analytics": analytics })))
}

/// GET /api/responses - analytics for every survey that has responses
pub async fn analytics_overview(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let overview = AnalyticsService::new(state.mongo.clone()).overview().await?;
    Ok(Json(overview))
}

/// Fills in question statistics the caller left out.
async fn complete_request(state: &AppState, req: &mut NarrativeRequest) -> ApiResult<()> {
    if req.question_analytics.is_some() {
        return Ok(());
    }

    let survey_id = parse_object_id(&req.survey_id, "Invalid survey ID")?;
    let survey = SurveyService::new(state.mongo.clone())
        .find(survey_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Survey not found".into()))?;
    let responses = AnalyticsService::new(state.mongo.clone())
        .responses_for(survey_id)
        .await?;

    tracing::debug!(survey_id = %survey_id, responses = responses.len(), "Computing statistics for narrative");

    req.question_analytics = Some(aggregate_questions(&survey.questions, &responses));
    req.total_responses.get_or_insert(responses.len() as u64);
    if req.survey_title.is_none() {
        req.survey_title = Some(survey.title);
    }
    if req.survey_description.is_none() {
        req.survey_description = survey.description;
    }
    if req.name.is_none() {
        req.name = survey.name;
    }
    Ok(())
}

/// POST /api/analysis/survey - narrative report over survey statistics
pub async fn narrative_analysis(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    let mut req: NarrativeRequest =
        serde_json::from_value(body).map_err(|_| ApiError::BadRequest("Invalid payload".into()))?;

    let service = NarrativeService::new(state.http.clone(), state.config.llm.clone());
    if !service.is_configured() {
        return Err(NarrativeError::MissingApiKey.into());
    }

    complete_request(&state, &mut req).await?;

    let response = service.analyze(&req).await?;
    Ok(Json(response))
}
