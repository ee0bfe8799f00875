use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::services::auth_service::AccountError;
use crate::services::collector::SubmissionError;
use crate::services::narrative_service::NarrativeError;
use crate::services::survey_service::SurveyError;
use crate::services::template_service::TemplateError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    /// Upstream dependency answered with an error
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Any status, with extra top-level fields merged into the body
    #[error("{message}")]
    Detailed {
        status: StatusCode,
        message: String,
        detail: Value,
    },

    /// Logged, never shown to the client
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Detailed { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(validation_message(&errors))
    }
}

impl From<SurveyError> for ApiError {
    fn from(err: SurveyError) -> Self {
        match err {
            SurveyError::NotFound | SurveyError::ResponseNotFound | SurveyError::NotOwned => {
                ApiError::NotFound(err.to_string())
            }
            SurveyError::Forbidden => ApiError::Forbidden(err.to_string()),
            SurveyError::Invalid(message) => ApiError::BadRequest(message),
            SurveyError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::MissingAnswers | SubmissionError::NotAccepting(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SubmissionError::SurveyNotFound => ApiError::NotFound(err.to_string()),
            SubmissionError::MissingRequired(ref ids) => ApiError::Detailed {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: err.to_string(),
                detail: json!({ "missingQuestions": ids }),
            },
            SubmissionError::UnknownQuestions(ref ids) => ApiError::Detailed {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: err.to_string(),
                detail: json!({ "unknownQuestions": ids }),
            },
            SubmissionError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken => ApiError::Conflict(err.to_string()),
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::Locked => ApiError::TooManyRequests(err.to_string()),
            AccountError::UserNotFound => ApiError::NotFound(err.to_string()),
            AccountError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::Invalid(message) => ApiError::BadRequest(message),
            TemplateError::Duplicate => ApiError::Conflict(err.to_string()),
            TemplateError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<NarrativeError> for ApiError {
    fn from(err: NarrativeError) -> Self {
        match err {
            NarrativeError::MissingApiKey => ApiError::ServiceUnavailable(err.to_string()),
            NarrativeError::Upstream(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

/// First human-readable message out of a validator error set
pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| format!("Validation error: {}", errors))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "Internal server error");
                json!({ "error": "Internal server error" })
            }
            ApiError::Detailed {
                message, detail, ..
            } => {
                let mut body = json!({ "error": message });
                if let (Value::Object(target), Value::Object(extra)) = (&mut body, detail) {
                    target.extend(extra);
                }
                body
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let (status, body) =
            body_json(ApiError::Internal(anyhow::anyhow!("connection refused at 10.0.0.3"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_detail_fields_are_merged() {
        let (status, body) = body_json(ApiError::Detailed {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Missing required answers".to_string(),
            detail: json!({ "missingQuestions": ["q1"] }),
        })
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Missing required answers");
        assert_eq!(body["missingQuestions"], json!(["q1"]));
    }

    #[tokio::test]
    async fn test_missing_required_answers_are_unprocessable() {
        let err = ApiError::from(SubmissionError::MissingRequired(vec!["q1".into(), "q3".into()]));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Required questions not answered");
        assert_eq!(body["missingQuestions"], json!(["q1", "q3"]));
    }

    #[test]
    fn test_domain_error_statuses() {
        assert_eq!(ApiError::from(SurveyError::NotOwned).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(SurveyError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(AccountError::EmailTaken).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(AccountError::Locked).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::from(NarrativeError::MissingApiKey).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(NarrativeError::Upstream(anyhow::anyhow!("timeout"))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::from(TemplateError::Duplicate).status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_plain_variants_carry_message() {
        let (status, body) = body_json(ApiError::NotFound("Survey not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Survey not found" }));
    }
}
