use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::Database;
use thiserror::Error;

use crate::metrics::track_db_operation;
use crate::models::response::SurveyResponse;
use crate::models::survey::{
    validate_questions, CreateSurveyRequest, PublishAction, Survey, SurveyStatus,
    UpdateSurveyRequest,
};
use crate::models::template::SurveyTemplate;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Survey not found")]
    NotFound,

    #[error("Response not found")]
    ResponseNotFound,

    #[error("Survey not found or access denied")]
    NotOwned,

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct SurveyService {
    mongo: Database,
}

impl SurveyService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn surveys(&self) -> mongodb::Collection<Survey> {
        self.mongo.collection::<Survey>("surveys")
    }

    pub async fn find(&self, survey_id: ObjectId) -> Result<Option<Survey>, SurveyError> {
        let survey = self
            .surveys()
            .find_one(doc! { "_id": survey_id })
            .await
            .context("Failed to query survey")?;
        Ok(survey)
    }

    async fn find_owned(&self, survey_id: ObjectId, owner: ObjectId) -> Result<Survey, SurveyError> {
        self.surveys()
            .find_one(doc! { "_id": survey_id, "createdBy": owner })
            .await
            .context("Failed to query survey")?
            .ok_or(SurveyError::NotOwned)
    }

    /// Surveys created by `owner`, newest first
    pub async fn list_for_owner(&self, owner: ObjectId) -> Result<Vec<Survey>, SurveyError> {
        let surveys = track_db_operation("find", "surveys", async {
            self.surveys()
                .find(doc! { "createdBy": owner })
                .sort(doc! { "createdAt": -1 })
                .await
                .context("Failed to query surveys")?
                .try_collect::<Vec<_>>()
                .await
                .context("Failed to read surveys")
        })
        .await?;
        Ok(surveys)
    }

    pub async fn create(
        &self,
        owner: ObjectId,
        req: CreateSurveyRequest,
    ) -> Result<Survey, SurveyError> {
        if !req.questions.is_empty() {
            validate_questions(&req.questions).map_err(SurveyError::Invalid)?;
        }

        let now = Utc::now();
        let survey = Survey {
            id: None,
            title: req.title.trim().to_string(),
            description: req.description,
            name: req.name,
            questions: req.questions,
            settings: req.settings,
            status: SurveyStatus::Draft,
            created_by: owner,
            created_at: now,
            updated_at: now,
            response_count: 0,
            template_id: None,
        };

        self.insert(survey).await
    }

    async fn insert(&self, mut survey: Survey) -> Result<Survey, SurveyError> {
        let result = track_db_operation("insert_one", "surveys", async {
            self.surveys()
                .insert_one(&survey)
                .await
                .context("Failed to insert survey")
        })
        .await?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Inserted survey has no ObjectId"))?;
        survey.id = Some(id);

        tracing::info!(survey_id = %id, title = %survey.title, "Survey created");
        Ok(survey)
    }

    /// Published survey built from a template, owned by `owner`
    pub async fn create_from_template(
        &self,
        owner: ObjectId,
        template: &SurveyTemplate,
        title: Option<String>,
    ) -> Result<Survey, SurveyError> {
        let now = Utc::now();
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| template.survey_title().to_string());

        let template_id = if template.id.is_empty() {
            template.object_id.map(|id| id.to_hex())
        } else {
            Some(template.id.clone())
        };

        let survey = Survey {
            id: None,
            title,
            description: Some(template.description.clone()),
            name: None,
            questions: template.questions.clone(),
            settings: template.settings.clone(),
            status: SurveyStatus::Published,
            created_by: owner,
            created_at: now,
            updated_at: now,
            response_count: 0,
            template_id,
        };

        self.insert(survey).await
    }

    /// Partial update by the owner; returns the updated document.
    pub async fn update(
        &self,
        survey_id: ObjectId,
        owner: ObjectId,
        req: UpdateSurveyRequest,
    ) -> Result<Survey, SurveyError> {
        self.find_owned(survey_id, owner).await?;

        let set = update_document(req)?;

        self.surveys()
            .find_one_and_update(doc! { "_id": survey_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update survey")?
            .ok_or(SurveyError::NotFound)
    }

    pub async fn set_status(
        &self,
        survey_id: ObjectId,
        action: PublishAction,
    ) -> Result<Survey, SurveyError> {
        let survey = self.find(survey_id).await?.ok_or(SurveyError::NotFound)?;

        if action == PublishAction::Publish && survey.questions.is_empty() {
            return Err(SurveyError::Invalid(
                "Cannot publish survey without questions".to_string(),
            ));
        }

        let status = action.target_status();
        let updated = self
            .surveys()
            .find_one_and_update(
                doc! { "_id": survey_id },
                doc! { "$set": {
                    "status": status.as_str(),
                    "updatedAt": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update survey status")?
            .ok_or(SurveyError::NotFound)?;

        tracing::info!(survey_id = %survey_id, status = status.as_str(), "Survey status changed");
        Ok(updated)
    }

    /// Copy of an owned survey as a fresh draft
    pub async fn duplicate(&self, survey_id: ObjectId, owner: ObjectId) -> Result<Survey, SurveyError> {
        let existing = self.find_owned(survey_id, owner).await?;
        let now = Utc::now();

        let copy = Survey {
            id: None,
            title: format!("{} (Copy)", existing.title),
            description: existing.description,
            name: existing.name,
            questions: existing.questions,
            settings: existing.settings,
            status: SurveyStatus::Draft,
            created_by: owner,
            created_at: now,
            updated_at: now,
            response_count: 0,
            template_id: existing.template_id,
        };

        self.insert(copy).await
    }

    /// Deletes a survey and all of its responses. Allowed for the owner and
    /// for admins.
    pub async fn delete(
        &self,
        survey_id: ObjectId,
        caller: ObjectId,
        caller_is_admin: bool,
    ) -> Result<(), SurveyError> {
        let survey = self.find(survey_id).await?.ok_or(SurveyError::NotFound)?;

        if !survey.is_owned_by(&caller) && !caller_is_admin {
            return Err(SurveyError::Forbidden);
        }

        let responses = self.mongo.collection::<SurveyResponse>("responses");
        let (_, removed) = tokio::try_join!(
            async {
                self.surveys()
                    .delete_one(doc! { "_id": survey_id })
                    .await
                    .context("Failed to delete survey")
            },
            async {
                responses
                    .delete_many(doc! { "surveyId": survey_id })
                    .await
                    .context("Failed to delete survey responses")
            },
        )?;

        tracing::info!(
            survey_id = %survey_id,
            responses_removed = removed.deleted_count,
            "Survey deleted"
        );
        Ok(())
    }

    /// Survey with its responses, newest first
    pub async fn with_responses(
        &self,
        survey_id: ObjectId,
    ) -> Result<(Survey, Vec<SurveyResponse>), SurveyError> {
        let survey = self.find(survey_id).await?.ok_or(SurveyError::NotFound)?;

        let responses = self
            .mongo
            .collection::<SurveyResponse>("responses")
            .find(doc! { "surveyId": survey_id })
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to query responses")?
            .try_collect()
            .await
            .context("Failed to read responses")?;

        Ok((survey, responses))
    }
}

/// `$set` document for a partial update; always touches `updatedAt`.
fn update_document(req: UpdateSurveyRequest) -> Result<Document, SurveyError> {
    let mut set = doc! { "updatedAt": bson::DateTime::now() };

    if let Some(title) = req.title {
        set.insert("title", title.trim());
    }
    if let Some(description) = req.description {
        set.insert("description", description);
    }
    if let Some(name) = req.name {
        set.insert("name", name);
    }
    if let Some(questions) = req.questions {
        validate_questions(&questions).map_err(SurveyError::Invalid)?;
        set.insert(
            "questions",
            bson::to_bson(&questions).context("Failed to encode questions")?,
        );
    }
    if let Some(settings) = req.settings {
        set.insert(
            "settings",
            bson::to_bson(&settings).context("Failed to encode settings")?,
        );
    }
    if let Some(status) = req.status {
        set.insert("status", status.as_str());
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_document_only_sets_given_fields() {
        let req: UpdateSurveyRequest =
            serde_json::from_value(json!({ "title": "  New title ", "status": "closed" })).unwrap();
        let set = update_document(req).unwrap();

        assert_eq!(set.get_str("title").unwrap(), "New title");
        assert_eq!(set.get_str("status").unwrap(), "closed");
        assert!(set.contains_key("updatedAt"));
        assert!(!set.contains_key("questions"));
        assert!(!set.contains_key("description"));
    }

    #[test]
    fn test_update_document_encodes_questions() {
        let req: UpdateSurveyRequest = serde_json::from_value(json!({
            "questions": [{ "id": "q1", "type": "rating", "question": "Rate us", "required": true }]
        }))
        .unwrap();
        let set = update_document(req).unwrap();

        let questions = set.get_array("questions").unwrap();
        let first = questions[0].as_document().unwrap();
        assert_eq!(first.get_str("type").unwrap(), "rating");
        assert!(first.get_bool("required").unwrap());
    }

    #[test]
    fn test_update_document_rejects_duplicate_question_ids() {
        let req: UpdateSurveyRequest = serde_json::from_value(json!({
            "questions": [
                { "id": "q1", "type": "text", "question": "A" },
                { "id": "q1", "type": "text", "question": "B" }
            ]
        }))
        .unwrap();
        assert!(matches!(update_document(req), Err(SurveyError::Invalid(_))));
    }
}
