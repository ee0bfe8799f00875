use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::survey::QuestionType;

/// Per-question statistics derived from stored responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_id: String,
    pub question_title: String,
    pub question_type: QuestionType,
    pub total_responses: u64,
    #[serde(default, serialize_with = "serialize_distribution")]
    pub distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub standard_deviation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nps_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_summary: Option<TextSummary>,
}

impl QuestionAnalytics {
    /// Distribution entries as emitted: numeric keys first in numeric order,
    /// then the rest lexically.
    pub fn ordered_distribution(&self) -> Vec<(&str, u64)> {
        ordered_entries(&self.distribution)
    }
}

fn numeric_key(key: &str) -> Option<f64> {
    key.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn ordered_entries(distribution: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = distribution
        .iter()
        .map(|(key, count)| (key.as_str(), *count))
        .collect();
    entries.sort_by(|(a, _), (b, _)| match (numeric_key(a), numeric_key(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    entries
}

fn serialize_distribution<S>(
    distribution: &BTreeMap<String, u64>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(ordered_entries(distribution))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextSummary {
    pub top_words: Vec<WordCount>,
    pub average_word_length: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    /// `YYYY-MM-DD` (UTC)
    pub date: String,
    pub count: u64,
}

/// Payload of `GET /api/surveys/{id}/analytics`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnalytics {
    pub survey_id: String,
    pub total_responses: u64,
    /// Percentage of responses flagged complete
    pub completion_rate: f64,
    /// Mean completion time in whole seconds
    pub average_time: i64,
    pub responses_by_date: Vec<DailyCount>,
    pub question_analytics: Vec<QuestionAnalytics>,
}

/// One survey in the admin overview
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyOverview {
    pub survey_id: String,
    pub survey_title: String,
    pub survey_description: Option<String>,
    pub name: Option<String>,
    pub total_responses: u64,
    pub created_at: DateTime<Utc>,
    pub question_analytics: Vec<QuestionAnalytics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub success: bool,
    pub analytics: Vec<SurveyOverview>,
    pub total_surveys: u64,
    pub total_responses: u64,
}

/// Body of `POST /api/analysis/survey`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub survey_id: String,
    pub survey_title: Option<String>,
    pub name: Option<String>,
    pub survey_description: Option<String>,
    pub total_responses: Option<u64>,
    pub created_at: Option<String>,
    /// Computed server-side when omitted
    pub question_analytics: Option<Vec<QuestionAnalytics>>,
}

#[derive(Debug, Serialize)]
pub struct NarrativeResponse {
    pub success: bool,
    pub analysis: String,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analytics_with(keys: &[&str]) -> QuestionAnalytics {
        QuestionAnalytics {
            question_id: "q1".to_string(),
            question_title: "Recommend us?".to_string(),
            question_type: QuestionType::Nps,
            total_responses: keys.len() as u64,
            distribution: keys.iter().map(|k| (k.to_string(), 1)).collect(),
            average: None,
            standard_deviation: None,
            nps_score: None,
            text_summary: None,
        }
    }

    #[test]
    fn test_numeric_keys_in_numeric_order() {
        let keys: Vec<String> = (0..=10).map(|n| n.to_string()).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let analytics = analytics_with(&keys);

        let ordered: Vec<&str> = analytics
            .ordered_distribution()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(ordered, keys);

        let json = serde_json::to_string(&analytics).unwrap();
        let two = json.find("\"2\":").unwrap();
        let ten = json.find("\"10\":").unwrap();
        assert!(two < ten, "{}", json);
    }

    #[test]
    fn test_mixed_keys_put_numbers_first() {
        let analytics = analytics_with(&["n/a", "10", "-1", "2.5", "Blue"]);

        let ordered: Vec<&str> = analytics
            .ordered_distribution()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(ordered, vec!["-1", "2.5", "10", "Blue", "n/a"]);
    }
}
