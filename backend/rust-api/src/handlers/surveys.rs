use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, ClientMeta},
    middlewares::{
        auth::{ensure_token_current, optional_claims, JwtClaims},
        rate_limit::{enforce, SUBMISSION_POLICY},
    },
    models::{
        response::{ResponseView, SubmitResponseRequest, SubmitResponseResponse},
        survey::{
            CreateFromTemplateRequest, CreateSurveyRequest, PublicSurveyView, PublishRequest,
            SurveyView, UpdateSurveyRequest,
        },
    },
    services::{
        collector::ResponseCollector,
        survey_service::SurveyService,
        template_service::{built_in_templates, TemplateService},
        AppState,
    },
    utils::parse_object_id,
};

const INVALID_SURVEY_ID: &str = "Invalid survey ID";

/// GET /api/surveys - surveys of the caller, newest first
pub async fn list_surveys(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<impl IntoResponse> {
    let surveys = SurveyService::new(state.mongo.clone())
        .list_for_owner(claims.user_id()?)
        .await?;

    let surveys: Vec<SurveyView> = surveys.into_iter().map(SurveyView::from).collect();
    Ok(Json(json!({ "surveys": surveys })))
}

/// POST /api/surveys - new draft
pub async fn create_survey(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateSurveyRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let survey = SurveyService::new(state.mongo.clone())
        .create(claims.user_id()?, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "survey": SurveyView::from(survey) })),
    ))
}

/// POST /api/surveys/from-template
pub async fn create_from_template(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateFromTemplateRequest>,
) -> ApiResult<impl IntoResponse> {
    let wanted_id = req
        .template_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Template ID is required".into()))?;

    let template = TemplateService::new(state.mongo.clone())
        .resolve(wanted_id, req.source)
        .await?;

    let Some(template) = template else {
        let local = built_in_templates();
        let example_ids: Vec<&str> = local.iter().map(|t| t.id.as_str()).take(20).collect();
        tracing::info!(template_id = %wanted_id, source = ?req.source, "Template not found");

        return Err(ApiError::Detailed {
            status: StatusCode::NOT_FOUND,
            message: "Template not found".into(),
            detail: json!({
                "success": false,
                "detail": {
                    "triedId": wanted_id,
                    "localCount": local.len(),
                    "exampleLocalIds": example_ids,
                    "sourceTried": req.source,
                }
            }),
        });
    };

    let survey = SurveyService::new(state.mongo.clone())
        .create_from_template(claims.user_id()?, &template, req.title)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "survey": SurveyView::from(survey) })),
    ))
}

/// GET /api/surveys/{id} - the owner gets the full document, everyone else
/// the respondent subset of an open survey.
pub async fn get_survey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;

    let survey = SurveyService::new(state.mongo.clone())
        .find(survey_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Survey not found".into()))?;

    if let Some(claims) = optional_claims(&state, &headers) {
        let is_owner = claims.user_id().is_ok_and(|uid| survey.is_owned_by(&uid));
        if is_owner && ensure_token_current(&state, &claims).await.is_ok() {
            return Ok(Json(json!({ "survey": SurveyView::from(survey) })));
        }
    }

    if !survey.status.accepts_responses() {
        return Err(ApiError::NotFound("Survey not available".into()));
    }

    Ok(Json(json!({ "survey": PublicSurveyView::from(survey) })))
}

/// PUT /api/surveys/{id} - partial update by the owner
pub async fn update_survey(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateSurveyRequest>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;
    req.validate()?;

    let survey = SurveyService::new(state.mongo.clone())
        .update(survey_id, claims.user_id()?, req)
        .await?;

    Ok(Json(json!({ "survey": SurveyView::from(survey) })))
}

/// DELETE /api/surveys/{id} - owner or admin; responses go with it
pub async fn delete_survey(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;

    SurveyService::new(state.mongo.clone())
        .delete(survey_id, claims.user_id()?, claims.is_admin())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/surveys/{id}/publish - `{ "action": "publish" | "unpublish" | "close" }`
pub async fn publish_survey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(body): AppJson<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;
    let req: PublishRequest =
        serde_json::from_value(body).map_err(|_| ApiError::BadRequest("Invalid action".into()))?;

    let survey = SurveyService::new(state.mongo.clone())
        .set_status(survey_id, req.action)
        .await?;

    Ok(Json(json!({ "survey": SurveyView::from(survey) })))
}

/// POST /api/surveys/{id}/duplicate
pub async fn duplicate_survey(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;

    let survey = SurveyService::new(state.mongo.clone())
        .duplicate(survey_id, claims.user_id()?)
        .await?;

    Ok(Json(json!({ "survey": SurveyView::from(survey) })))
}

/// GET /api/surveys/{id}/responses - survey plus its responses, newest first
pub async fn list_survey_responses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;

    let (survey, responses) = SurveyService::new(state.mongo.clone())
        .with_responses(survey_id)
        .await?;

    let responses: Vec<ResponseView> = responses.into_iter().map(ResponseView::from).collect();
    Ok(Json(json!({
        "survey": SurveyView::from(survey),
        "responses": responses,
    })))
}

/// POST /api/surveys/{id}/responses - public submission
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ClientMeta(client): ClientMeta,
    AppJson(req): AppJson<SubmitResponseRequest>,
) -> ApiResult<impl IntoResponse> {
    let survey_id = parse_object_id(&id, INVALID_SURVEY_ID)?;

    let ip = client.ip_address.as_deref().unwrap_or("unknown");
    enforce(&state, SUBMISSION_POLICY, ip).await?;

    let response_id = ResponseCollector::new(state.mongo.clone())
        .submit(survey_id, req, client)
        .await?;

    Ok(Json(SubmitResponseResponse {
        message: "Response submitted successfully".to_string(),
        response_id: response_id.to_hex(),
    }))
}
