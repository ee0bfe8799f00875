//! Per-question aggregation of stored responses.
//!
//! Everything here except [`AnalyticsService`] is pure: the same questions and
//! responses always produce the same output.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use std::collections::{BTreeMap, HashMap};

use crate::metrics::{track_db_operation, SURVEY_ANALYTICS_COMPUTED_TOTAL};
use crate::models::analytics::{
    AnalyticsOverview, DailyCount, QuestionAnalytics, SurveyAnalytics, SurveyOverview,
};
use crate::models::response::{format_number, ResponseValue, SurveyResponse};
use crate::models::survey::{Question, QuestionKind, QuestionType, Survey};
use crate::services::text_summary::{self, round2};

/// Window covered by `responsesByDate`
pub const RESPONSES_BY_DATE_DAYS: i64 = 30;

/// One record per question, in survey order.
pub fn aggregate_questions(
    questions: &[Question],
    responses: &[SurveyResponse],
) -> Vec<QuestionAnalytics> {
    questions
        .iter()
        .map(|question| {
            let answers = responses
                .iter()
                .filter_map(|response| response.responses.get(&question.id))
                .filter(|value| value.is_present());
            aggregate_question(question, answers)
        })
        .collect()
}

/// Statistics for one question over its present answers.
pub fn aggregate_question<'a, I>(question: &Question, answers: I) -> QuestionAnalytics
where
    I: IntoIterator<Item = &'a ResponseValue>,
{
    let answers: Vec<&ResponseValue> = answers.into_iter().collect();
    let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut average = None;
    let mut standard_deviation = None;
    let mut nps_score = None;

    match question.question_type.kind() {
        QuestionKind::Choice | QuestionKind::FreeText => {
            for answer in &answers {
                *distribution.entry(answer.display_string()).or_insert(0) += 1;
            }
        }
        QuestionKind::MultiSelect => {
            for answer in &answers {
                for choice in answer.selections() {
                    *distribution.entry(choice).or_insert(0) += 1;
                }
            }
        }
        QuestionKind::Numeric => {
            let values: Vec<f64> = answers.iter().filter_map(|a| a.as_number()).collect();
            if let Some((mean, std_dev)) = mean_and_std_dev(&values) {
                average = Some(round2(mean));
                standard_deviation = Some(round2(std_dev));
            }
            if question.question_type == QuestionType::Nps {
                nps_score = nps(&values);
            }
            for value in &values {
                *distribution.entry(format_number(*value)).or_insert(0) += 1;
            }
        }
    }

    let text_summary = question
        .question_type
        .is_prose()
        .then(|| text_summary::summarize(&distribution));

    QuestionAnalytics {
        question_id: question.id.clone(),
        question_title: question.display_title().to_string(),
        question_type: question.question_type,
        total_responses: answers.len() as u64,
        distribution,
        average,
        standard_deviation,
        nps_score,
        text_summary,
    }
}

/// Mean and population standard deviation, unrounded. None for no values.
pub fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Net Promoter Score: % of 9-10 answers minus % of 0-6 answers.
pub fn nps(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let promoters = values.iter().filter(|v| **v >= 9.0).count() as f64;
    let detractors = values.iter().filter(|v| **v <= 6.0).count() as f64;
    Some((promoters - detractors) / values.len() as f64 * 100.0)
}

/// Daily response counts over the last 30 days, oldest day first.
pub fn responses_by_date(responses: &[SurveyResponse], now: DateTime<Utc>) -> Vec<DailyCount> {
    let since = now - Duration::days(RESPONSES_BY_DATE_DAYS);
    let mut per_day: BTreeMap<String, u64> = BTreeMap::new();
    for response in responses.iter().filter(|r| r.created_at >= since) {
        *per_day
            .entry(response.created_at.format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
    }
    per_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}

/// Share of responses flagged complete, in percent.
pub fn completion_rate(responses: &[SurveyResponse]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    let complete = responses.iter().filter(|r| r.metadata.is_complete).count() as f64;
    complete / responses.len() as f64 * 100.0
}

/// Mean of `endTime - startTime`, in whole seconds.
pub fn average_time_seconds(responses: &[SurveyResponse]) -> i64 {
    if responses.is_empty() {
        return 0;
    }
    let total_ms: i64 = responses
        .iter()
        .map(|r| (r.metadata.end_time - r.metadata.start_time).num_milliseconds())
        .sum();
    (total_ms as f64 / responses.len() as f64 / 1000.0).round() as i64
}

pub fn summarize_survey(
    survey: &Survey,
    responses: &[SurveyResponse],
    now: DateTime<Utc>,
) -> SurveyAnalytics {
    SurveyAnalytics {
        survey_id: survey.id.map(|id| id.to_hex()).unwrap_or_default(),
        total_responses: responses.len() as u64,
        completion_rate: completion_rate(responses),
        average_time: average_time_seconds(responses),
        responses_by_date: responses_by_date(responses, now),
        question_analytics: aggregate_questions(&survey.questions, responses),
    }
}

/// Overview across surveys; surveys without responses are left out, as are
/// responses whose survey no longer exists.
pub fn build_overview(surveys: &[Survey], responses: Vec<SurveyResponse>) -> AnalyticsOverview {
    let total_responses = responses.len() as u64;

    let mut by_survey: HashMap<ObjectId, Vec<SurveyResponse>> = HashMap::new();
    for response in responses {
        by_survey.entry(response.survey_id).or_default().push(response);
    }

    let analytics: Vec<SurveyOverview> = surveys
        .iter()
        .filter_map(|survey| {
            let id = survey.id?;
            let survey_responses = by_survey.get(&id)?;
            Some(SurveyOverview {
                survey_id: id.to_hex(),
                survey_title: survey.title.clone(),
                survey_description: survey.description.clone(),
                name: survey.name.clone(),
                total_responses: survey_responses.len() as u64,
                created_at: survey.created_at,
                question_analytics: aggregate_questions(&survey.questions, survey_responses),
            })
        })
        .collect();

    AnalyticsOverview {
        success: true,
        total_surveys: analytics.len() as u64,
        analytics,
        total_responses,
    }
}

pub struct AnalyticsService {
    mongo: Database,
}

impl AnalyticsService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn responses_for(&self, survey_id: ObjectId) -> Result<Vec<SurveyResponse>> {
        let responses = self.mongo.collection::<SurveyResponse>("responses");
        track_db_operation("find", "responses", async {
            responses
                .find(doc! { "surveyId": survey_id })
                .await
                .context("Failed to query responses")?
                .try_collect()
                .await
                .context("Failed to read responses")
        })
        .await
    }

    /// Analytics for a survey owned by `owner`; None when the survey does not
    /// exist or belongs to someone else.
    pub async fn survey_analytics(
        &self,
        survey_id: ObjectId,
        owner: ObjectId,
    ) -> Result<Option<SurveyAnalytics>> {
        let surveys = self.mongo.collection::<Survey>("surveys");
        let survey = surveys
            .find_one(doc! { "_id": survey_id, "createdBy": owner })
            .await
            .context("Failed to query survey")?;

        let Some(survey) = survey else {
            return Ok(None);
        };

        let responses = self.responses_for(survey_id).await?;
        SURVEY_ANALYTICS_COMPUTED_TOTAL
            .with_label_values(&["survey"])
            .inc();

        tracing::debug!(
            survey_id = %survey_id,
            responses = responses.len(),
            "Computed survey analytics"
        );

        Ok(Some(summarize_survey(&survey, &responses, Utc::now())))
    }

    pub async fn overview(&self) -> Result<AnalyticsOverview> {
        let surveys: Vec<Survey> = self
            .mongo
            .collection::<Survey>("surveys")
            .find(doc! {})
            .await
            .context("Failed to query surveys")?
            .try_collect()
            .await
            .context("Failed to read surveys")?;

        let responses: Vec<SurveyResponse> = self
            .mongo
            .collection::<SurveyResponse>("responses")
            .find(doc! {})
            .await
            .context("Failed to query responses")?
            .try_collect()
            .await
            .context("Failed to read responses")?;

        SURVEY_ANALYTICS_COMPUTED_TOTAL
            .with_label_values(&["overview"])
            .inc();

        Ok(build_overview(&surveys, responses))
    }
}
