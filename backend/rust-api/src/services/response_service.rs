use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use std::collections::HashMap;

use crate::models::response::{RecentResponse, SurveyResponse};
use crate::models::survey::Survey;
use crate::services::survey_service::SurveyError;

pub const RECENT_RESPONSES_LIMIT: i64 = 4;

pub struct ResponseService {
    mongo: Database,
}

impl ResponseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn responses(&self) -> mongodb::Collection<SurveyResponse> {
        self.mongo.collection::<SurveyResponse>("responses")
    }

    fn surveys(&self) -> mongodb::Collection<Survey> {
        self.mongo.collection::<Survey>("surveys")
    }

    /// A response and its survey, if the caller owns that survey.
    pub async fn get_owned(
        &self,
        response_id: ObjectId,
        caller: ObjectId,
    ) -> Result<(SurveyResponse, Survey), SurveyError> {
        let response = self
            .responses()
            .find_one(doc! { "_id": response_id })
            .await
            .context("Failed to query response")?
            .ok_or(SurveyError::ResponseNotFound)?;

        let survey = self
            .surveys()
            .find_one(doc! { "_id": response.survey_id, "createdBy": caller })
            .await
            .context("Failed to query survey")?
            .ok_or(SurveyError::Forbidden)?;

        Ok((response, survey))
    }

    /// Deletes a response of a survey the caller owns and decrements the
    /// survey's counter.
    pub async fn delete_owned(
        &self,
        response_id: ObjectId,
        caller: ObjectId,
    ) -> Result<(), SurveyError> {
        let (response, survey) = self.get_owned(response_id, caller).await?;

        self.responses()
            .delete_one(doc! { "_id": response_id })
            .await
            .context("Failed to delete response")?;

        self.surveys()
            .update_one(
                doc! { "_id": response.survey_id },
                doc! { "$inc": { "responseCount": -1 } },
            )
            .await
            .context("Failed to decrement response count")?;

        tracing::info!(
            response_id = %response_id,
            survey_id = %response.survey_id,
            survey_title = %survey.title,
            "Survey response deleted"
        );
        Ok(())
    }

    /// Latest responses across all surveys with their survey titles
    pub async fn recent(&self) -> anyhow::Result<Vec<RecentResponse>> {
        let latest: Vec<SurveyResponse> = self
            .responses()
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .limit(RECENT_RESPONSES_LIMIT)
            .await
            .context("Failed to query recent responses")?
            .try_collect()
            .await
            .context("Failed to read recent responses")?;

        let survey_ids: Vec<ObjectId> = latest.iter().map(|r| r.survey_id).collect();
        let titles: HashMap<ObjectId, String> = self
            .surveys()
            .find(doc! { "_id": { "$in": survey_ids } })
            .await
            .context("Failed to query surveys")?
            .try_collect::<Vec<_>>()
            .await
            .context("Failed to read surveys")?
            .into_iter()
            .filter_map(|s| s.id.map(|id| (id, s.title)))
            .collect();

        Ok(latest
            .into_iter()
            .map(|response| to_recent(response, &titles))
            .collect())
    }
}

fn to_recent(response: SurveyResponse, titles: &HashMap<ObjectId, String>) -> RecentResponse {
    RecentResponse {
        id: response.id.map(|id| id.to_hex()).unwrap_or_default(),
        survey_id: response.survey_id.to_hex(),
        survey_title: titles
            .get(&response.survey_id)
            .cloned()
            .unwrap_or_else(|| "Untitled Survey".to_string()),
        respondent_email: response.respondent_info.and_then(|info| info.email),
        answers_count: response.responses.len(),
        created_at: response.created_at,
    }
}
