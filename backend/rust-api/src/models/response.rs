use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bson_datetime_as_chrono;

/// Raw answer value as submitted by a respondent.
///
/// Variant order matters: `untagged` tries them top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// checkbox selections
    Choices(Vec<String>),
    /// matrix answers: row id -> column label
    Matrix(BTreeMap<String, String>),
}

/// Question id -> answer
pub type Answers = BTreeMap<String, ResponseValue>;

impl ResponseValue {
    /// An answer counts when it carries something: not null, not an empty
    /// string, not an empty selection.
    pub fn is_present(&self) -> bool {
        match self {
            ResponseValue::Null => false,
            ResponseValue::Text(text) => !text.is_empty(),
            ResponseValue::Choices(choices) => !choices.is_empty(),
            ResponseValue::Matrix(rows) => !rows.is_empty(),
            ResponseValue::Bool(_) | ResponseValue::Number(_) => true,
        }
    }

    /// Numeric reading of the answer, if it has one. Strings are trimmed and
    /// parsed, a blank string reads as 0; booleans count as 0/1; non-finite
    /// values are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            ResponseValue::Number(n) => *n,
            ResponseValue::Text(text) if text.trim().is_empty() => 0.0,
            ResponseValue::Text(text) => text.trim().parse::<f64>().ok()?,
            ResponseValue::Bool(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            ResponseValue::Null | ResponseValue::Choices(_) | ResponseValue::Matrix(_) => {
                return None
            }
        };
        value.is_finite().then_some(value)
    }

    /// Flat string form used as a distribution key
    pub fn display_string(&self) -> String {
        match self {
            ResponseValue::Null => String::new(),
            ResponseValue::Bool(flag) => flag.to_string(),
            ResponseValue::Number(n) => format_number(*n),
            ResponseValue::Text(text) => text.clone(),
            ResponseValue::Choices(choices) => choices.join(","),
            ResponseValue::Matrix(rows) => rows
                .iter()
                .map(|(row, column)| format!("{}: {}", row, column))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Options selected by this answer; a scalar counts as one selection.
    pub fn selections(&self) -> Vec<String> {
        match self {
            ResponseValue::Choices(choices) => choices.clone(),
            ResponseValue::Null => Vec::new(),
            other => vec![other.display_string()],
        }
    }
}

/// Renders whole numbers without a fractional part (`7`, not `7.0`).
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    value.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_complete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RespondentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One submission, stored in MongoDB "responses" collection. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub survey_id: ObjectId,
    #[serde(default)]
    pub responses: Answers,
    pub metadata: ResponseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_info: Option<RespondentInfo>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub id: String,
    pub survey_id: String,
    pub responses: Answers,
    pub metadata: ResponseMetadataView,
    pub respondent_info: Option<RespondentInfo>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadataView {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_complete: bool,
}

impl From<ResponseMetadata> for ResponseMetadataView {
    fn from(metadata: ResponseMetadata) -> Self {
        ResponseMetadataView {
            ip_address: metadata.ip_address,
            user_agent: metadata.user_agent,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
            is_complete: metadata.is_complete,
        }
    }
}

impl From<SurveyResponse> for ResponseView {
    fn from(response: SurveyResponse) -> Self {
        ResponseView {
            id: response.id.map(|id| id.to_hex()).unwrap_or_default(),
            survey_id: response.survey_id.to_hex(),
            responses: response.responses,
            metadata: response.metadata.into(),
            respondent_info: response.respondent_info,
            created_at: response.created_at,
        }
    }
}

/// Body of `POST /api/surveys/{id}/responses`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    pub responses: Option<Answers>,
    pub respondent_info: Option<RespondentInfo>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseResponse {
    pub message: String,
    pub response_id: String,
}

/// Row of the admin "recent activity" list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentResponse {
    pub id: String,
    pub survey_id: String,
    pub survey_title: String,
    pub respondent_email: Option<String>,
    pub answers_count: usize,
    pub created_at: DateTime<Utc>,
}
