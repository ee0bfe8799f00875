//! Response submission: validation, metadata stamping, persistence.

use anyhow::Context;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use std::collections::HashSet;
use thiserror::Error;

use crate::metrics::{record_submission, track_db_operation};
use crate::models::response::{
    Answers, ResponseMetadata, SubmitResponseRequest, SurveyResponse,
};
use crate::models::survey::{Question, Survey, SurveyStatus};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Response data is required")]
    MissingAnswers,

    #[error("Survey not found")]
    SurveyNotFound,

    #[error("Survey is not available for responses")]
    NotAccepting(SurveyStatus),

    #[error("Required questions not answered")]
    MissingRequired(Vec<String>),

    #[error("Answers reference unknown questions")]
    UnknownQuestions(Vec<String>),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SubmissionError {
    fn metric_label(&self) -> &'static str {
        match self {
            SubmissionError::MissingAnswers => "invalid",
            SubmissionError::SurveyNotFound => "not_found",
            SubmissionError::NotAccepting(_) => "closed",
            SubmissionError::MissingRequired(_) => "missing_required",
            SubmissionError::UnknownQuestions(_) => "unknown_questions",
            SubmissionError::Store(_) => "error",
        }
    }
}

/// Request-side facts recorded with a submission
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Ids of required questions whose answer is absent, null, "" or an empty
/// selection. `0` and `false` count as answers.
pub fn missing_required(questions: &[Question], answers: &Answers) -> Vec<String> {
    questions
        .iter()
        .filter(|q| q.required)
        .filter(|q| !answers.get(&q.id).is_some_and(|value| value.is_present()))
        .map(|q| q.id.clone())
        .collect()
}

/// Answer keys that match no question of the survey
pub fn unknown_answers(questions: &[Question], answers: &Answers) -> Vec<String> {
    let known: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
    answers
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect()
}

/// Everything short of the write: survey state and answer set.
pub fn validate_submission(survey: &Survey, answers: &Answers) -> Result<(), SubmissionError> {
    if !survey.status.accepts_responses() {
        return Err(SubmissionError::NotAccepting(survey.status));
    }

    let missing = missing_required(&survey.questions, answers);
    if !missing.is_empty() {
        return Err(SubmissionError::MissingRequired(missing));
    }

    let unknown = unknown_answers(&survey.questions, answers);
    if !unknown.is_empty() {
        return Err(SubmissionError::UnknownQuestions(unknown));
    }

    Ok(())
}

/// Builds the stored record, honouring the survey's privacy settings.
pub fn build_response(
    survey_id: ObjectId,
    survey: &Survey,
    answers: Answers,
    request: &SubmitResponseRequest,
    client: &ClientInfo,
    now: DateTime<Utc>,
) -> SurveyResponse {
    let ip_address = if survey.settings.collect_ip {
        Some(
            client
                .ip_address
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        )
    } else {
        None
    };

    let respondent_info = if survey.settings.collect_email {
        request.respondent_info.clone()
    } else {
        None
    };

    SurveyResponse {
        id: None,
        survey_id,
        responses: answers,
        metadata: ResponseMetadata {
            ip_address,
            user_agent: Some(
                client
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            start_time: request.start_time.unwrap_or(now),
            end_time: now,
            is_complete: true,
        },
        respondent_info,
        created_at: now,
    }
}

pub struct ResponseCollector {
    mongo: Database,
}

impl ResponseCollector {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Validates and stores one submission, then bumps the survey counter.
    /// Nothing is written when validation fails.
    pub async fn submit(
        &self,
        survey_id: ObjectId,
        request: SubmitResponseRequest,
        client: ClientInfo,
    ) -> Result<ObjectId, SubmissionError> {
        let result = self.try_submit(survey_id, request, client).await;
        match &result {
            Ok(_) => record_submission("accepted"),
            Err(e) => record_submission(e.metric_label()),
        }
        result
    }

    async fn try_submit(
        &self,
        survey_id: ObjectId,
        mut request: SubmitResponseRequest,
        client: ClientInfo,
    ) -> Result<ObjectId, SubmissionError> {
        let answers = request
            .responses
            .take()
            .ok_or(SubmissionError::MissingAnswers)?;

        let surveys = self.mongo.collection::<Survey>("surveys");
        let survey = surveys
            .find_one(doc! { "_id": survey_id })
            .await
            .context("Failed to query survey")?
            .ok_or(SubmissionError::SurveyNotFound)?;

        validate_submission(&survey, &answers)?;

        let response = build_response(survey_id, &survey, answers, &request, &client, Utc::now());

        let responses = self.mongo.collection::<SurveyResponse>("responses");
        let inserted = track_db_operation("insert_one", "responses", async {
            responses
                .insert_one(&response)
                .await
                .context("Failed to insert response")
        })
        .await?;

        let response_id = inserted
            .inserted_id
            .as_object_id()
            .context("Inserted response has no ObjectId")?;

        surveys
            .update_one(
                doc! { "_id": survey_id },
                doc! { "$inc": { "responseCount": 1 } },
            )
            .await
            .context("Failed to increment response count")?;

        tracing::info!(
            survey_id = %survey_id,
            response_id = %response_id,
            "Survey response recorded"
        );

        Ok(response_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::response::{RespondentInfo, ResponseValue};
    use serde_json::json;

    fn survey(questions: serde_json::Value, settings: serde_json::Value) -> Survey {
        Survey {
            id: Some(ObjectId::new()),
            title: "Feedback".to_string(),
            description: None,
            name: None,
            questions: serde_json::from_value(questions).unwrap(),
            settings: serde_json::from_value(settings).unwrap(),
            status: SurveyStatus::Published,
            created_by: ObjectId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            response_count: 0,
            template_id: None,
        }
    }

    fn answers(value: serde_json::Value) -> Answers {
        serde_json::from_value(value).unwrap()
    }

    fn request(value: serde_json::Value) -> SubmitResponseRequest {
        serde_json::from_value(value).unwrap()
    }

    fn two_required() -> Survey {
        survey(
            json!([
                { "id": "q1", "type": "nps", "question": "Recommend?", "required": true },
                { "id": "q2", "type": "checkbox", "question": "Which?", "required": true },
                { "id": "q3", "type": "text", "question": "Else?" }
            ]),
            json!({}),
        )
    }

    #[test]
    fn test_missing_required_detects_absent_null_empty() {
        let survey = two_required();

        assert_eq!(
            missing_required(&survey.questions, &answers(json!({}))),
            vec!["q1", "q2"]
        );
        assert_eq!(
            missing_required(&survey.questions, &answers(json!({ "q1": null, "q2": [] }))),
            vec!["q1", "q2"]
        );
        assert_eq!(
            missing_required(&survey.questions, &answers(json!({ "q1": "", "q2": ["A"] }))),
            vec!["q1"]
        );
    }

    #[test]
    fn test_zero_and_false_are_answers() {
        let survey = two_required();
        let given = answers(json!({ "q1": 0, "q2": false }));
        assert!(missing_required(&survey.questions, &given).is_empty());
    }

    #[test]
    fn test_validate_submission_rejects_missing_required() {
        let survey = two_required();
        let err = validate_submission(&survey, &answers(json!({ "q2": ["A"] }))).unwrap_err();
        match err {
            SubmissionError::MissingRequired(ids) => assert_eq!(ids, vec!["q1"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_submission_rejects_unknown_keys() {
        let survey = two_required();
        let err = validate_submission(
            &survey,
            &answers(json!({ "q1": 9, "q2": ["A"], "q99": "?" })),
        )
        .unwrap_err();
        assert!(matches!(err, SubmissionError::UnknownQuestions(ids) if ids == vec!["q99"]));
    }

    #[test]
    fn test_closed_survey_not_accepting() {
        let mut survey = two_required();
        survey.status = SurveyStatus::Closed;
        let err = validate_submission(&survey, &answers(json!({ "q1": 9, "q2": ["A"] })))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NotAccepting(SurveyStatus::Closed)));

        survey.status = SurveyStatus::Draft;
        assert!(validate_submission(&survey, &answers(json!({ "q1": 9, "q2": ["A"] }))).is_ok());
    }

    #[test]
    fn test_type_mismatch_is_not_rejected() {
        let survey = two_required();
        assert!(
            validate_submission(&survey, &answers(json!({ "q1": "loads", "q2": ["A"] }))).is_ok()
        );
    }

    #[test]
    fn test_build_response_respects_privacy_settings() {
        let private = two_required();
        let client = ClientInfo {
            ip_address: Some("1.2.3.4".into()),
            user_agent: None,
        };
        let req = request(json!({
            "responses": { "q1": 9 },
            "respondentInfo": { "email": "r@example.com" }
        }));
        let now = Utc::now();

        let stored = build_response(
            ObjectId::new(),
            &private,
            answers(json!({ "q1": 9 })),
            &req,
            &client,
            now,
        );
        assert!(stored.metadata.ip_address.is_none());
        assert!(stored.respondent_info.is_none());
        assert_eq!(stored.metadata.user_agent.as_deref(), Some("unknown"));
        assert_eq!(stored.metadata.start_time, now);
        assert_eq!(stored.metadata.end_time, now);
        assert!(stored.metadata.is_complete);
        assert_eq!(stored.responses["q1"], ResponseValue::Number(9.0));

        let open = survey(
            json!([{ "id": "q1", "type": "nps", "question": "Recommend?" }]),
            json!({ "collectIP": true, "collectEmail": true }),
        );
        let stored = build_response(ObjectId::new(), &open, Answers::new(), &req, &client, now);
        assert_eq!(stored.metadata.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(
            stored.respondent_info,
            Some(RespondentInfo {
                email: Some("r@example.com".into()),
                name: None
            })
        );
    }

    #[test]
    fn test_build_response_keeps_client_start_time() {
        let survey = two_required();
        let req = request(json!({ "responses": {}, "startTime": "2024-01-01T10:00:00Z" }));
        let now = Utc::now();

        let stored = build_response(
            ObjectId::new(),
            &survey,
            Answers::new(),
            &req,
            &ClientInfo::default(),
            now,
        );
        assert_eq!(stored.metadata.start_time.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        assert_eq!(stored.metadata.end_time, now);
    }
}
