use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Question types a survey can declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    Text,
    Textarea,
    MultipleChoice,
    Checkbox,
    Dropdown,
    Rating,
    Scale,
    Nps,
    Date,
    Time,
    Email,
    Phone,
    Number,
    Url,
    Matrix,
}

/// How the aggregator treats the answers of a question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// One distinct string per answer (multiple-choice, dropdown)
    Choice,
    /// Array answers, each selected option counted (checkbox)
    MultiSelect,
    /// Coerced to numbers (rating, scale, nps, number)
    Numeric,
    /// Everything else, counted by literal answer string
    FreeText,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::Checkbox => "checkbox",
            QuestionType::Dropdown => "dropdown",
            QuestionType::Rating => "rating",
            QuestionType::Scale => "scale",
            QuestionType::Nps => "nps",
            QuestionType::Date => "date",
            QuestionType::Time => "time",
            QuestionType::Email => "email",
            QuestionType::Phone => "phone",
            QuestionType::Number => "number",
            QuestionType::Url => "url",
            QuestionType::Matrix => "matrix",
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionType::MultipleChoice | QuestionType::Dropdown => QuestionKind::Choice,
            QuestionType::Checkbox => QuestionKind::MultiSelect,
            QuestionType::Rating | QuestionType::Scale | QuestionType::Nps | QuestionType::Number => {
                QuestionKind::Numeric
            }
            _ => QuestionKind::FreeText,
        }
    }

    /// Free-text prompts whose answers get a word-frequency summary
    pub fn is_prose(&self) -> bool {
        matches!(self, QuestionType::Text | QuestionType::Textarea)
    }
}

/// Choice list, stored either as a bare array or as an object with extras.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum QuestionOptions {
    Choices(Vec<String>),
    Detailed(DetailedOptions),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailedOptions {
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl QuestionOptions {
    pub fn choices(&self) -> &[String] {
        match self {
            QuestionOptions::Choices(choices) => choices,
            QuestionOptions::Detailed(detailed) => &detailed.choices,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuestionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub title: String,
    /// Prompt text shown to the respondent
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<QuestionOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<QuestionSettings>,
}

impl Question {
    /// Title used in analytics; templates often only fill in the prompt.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.question
        } else {
            &self.title
        }
    }
}

/// Checks that every question has a non-empty id and that ids are unique.
pub fn validate_questions(questions: &[Question]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() {
            return Err("Every question needs an id".to_string());
        }
        if !seen.insert(question.id.as_str()) {
            return Err(format!("Duplicate question id: {}", question.id));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SurveySettings {
    pub allow_anonymous: bool,
    pub require_auth: bool,
    pub multiple_responses: bool,
    pub show_progress_bar: bool,
    pub randomize_questions: bool,
    pub collect_email: bool,
    #[serde(rename = "collectIP")]
    pub collect_ip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thank_you_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Published,
    Closed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Published => "published",
            SurveyStatus::Closed => "closed",
        }
    }

    /// Drafts stay open so owners can test them before publishing.
    pub fn accepts_responses(&self) -> bool {
        matches!(self, SurveyStatus::Draft | SurveyStatus::Published)
    }
}

/// Survey stored in MongoDB "surveys" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: SurveySettings,
    #[serde(default)]
    pub status: SurveyStatus,
    pub created_by: ObjectId,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub response_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl Survey {
    pub fn is_owned_by(&self, user_id: &ObjectId) -> bool {
        &self.created_by == user_id
    }
}

/// Full survey returned to its owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub name: Option<String>,
    pub questions: Vec<Question>,
    pub settings: SurveySettings,
    pub status: SurveyStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub response_count: i64,
    pub template_id: Option<String>,
}

impl From<Survey> for SurveyView {
    fn from(survey: Survey) -> Self {
        SurveyView {
            id: survey.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: survey.title,
            description: survey.description,
            name: survey.name,
            questions: survey.questions,
            settings: survey.settings,
            status: survey.status,
            created_by: survey.created_by.to_hex(),
            created_at: survey.created_at,
            updated_at: survey.updated_at,
            response_count: survey.response_count,
            template_id: survey.template_id,
        }
    }
}

/// Subset shown to respondents
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSurveyView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub settings: SurveySettings,
}

impl From<Survey> for PublicSurveyView {
    fn from(survey: Survey) -> Self {
        PublicSurveyView {
            id: survey.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: survey.title,
            description: survey.description,
            questions: survey.questions,
            settings: survey.settings,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSurveyRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,
    pub description: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: SurveySettings,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSurveyRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub settings: Option<SurveySettings>,
    pub status: Option<SurveyStatus>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Publish,
    Unpublish,
    Close,
}

impl PublishAction {
    pub fn target_status(&self) -> SurveyStatus {
        match self {
            PublishAction::Publish => SurveyStatus::Published,
            PublishAction::Unpublish => SurveyStatus::Draft,
            PublishAction::Close => SurveyStatus::Closed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub action: PublishAction,
}

/// Where `from-template` looks for the template id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSource {
    /// Templates bundled with the binary
    Local,
    /// The "templates" collection
    Db,
    /// Bundled first, then the collection
    #[default]
    Auto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFromTemplateRequest {
    pub template_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub source: TemplateSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_type_wire_names() {
        let parsed: QuestionType = serde_json::from_value(json!("multiple-choice")).unwrap();
        assert_eq!(parsed, QuestionType::MultipleChoice);
        assert_eq!(
            serde_json::to_value(QuestionType::Nps).unwrap(),
            json!("nps")
        );
        assert_eq!(QuestionType::Textarea.as_str(), "textarea");
    }

    #[test]
    fn test_question_kinds() {
        assert_eq!(QuestionType::Dropdown.kind(), QuestionKind::Choice);
        assert_eq!(QuestionType::Checkbox.kind(), QuestionKind::MultiSelect);
        assert_eq!(QuestionType::Scale.kind(), QuestionKind::Numeric);
        assert_eq!(QuestionType::Email.kind(), QuestionKind::FreeText);
        assert!(QuestionType::Textarea.is_prose());
        assert!(!QuestionType::Email.is_prose());
    }

    #[test]
    fn test_options_accept_both_shapes() {
        let plain: QuestionOptions = serde_json::from_value(json!(["Red", "Blue"])).unwrap();
        assert_eq!(plain.choices(), ["Red", "Blue"]);

        let detailed: QuestionOptions =
            serde_json::from_value(json!({ "choices": ["Yes"], "placeholder": "Pick" })).unwrap();
        assert_eq!(detailed.choices(), ["Yes"]);
    }

    #[test]
    fn test_settings_wire_names() {
        let settings: SurveySettings =
            serde_json::from_value(json!({ "collectIP": true, "collectEmail": true })).unwrap();
        assert!(settings.collect_ip);
        assert!(settings.collect_email);
        assert!(!settings.allow_anonymous);
    }

    #[test]
    fn test_validate_questions_rejects_duplicates() {
        let question: Question = serde_json::from_value(json!({
            "id": "q1",
            "type": "text",
            "question": "Anything else?"
        }))
        .unwrap();

        assert!(validate_questions(&[question.clone()]).is_ok());
        assert!(validate_questions(&[question.clone(), question]).is_err());
    }

    #[test]
    fn test_display_title_falls_back_to_prompt() {
        let question: Question = serde_json::from_value(json!({
            "id": "q1",
            "type": "text",
            "question": "How was it?"
        }))
        .unwrap();
        assert_eq!(question.display_title(), "How was it?");
    }

    #[test]
    fn test_status_accepts_responses() {
        assert!(SurveyStatus::Draft.accepts_responses());
        assert!(SurveyStatus::Published.accepts_responses());
        assert!(!SurveyStatus::Closed.accepts_responses());
        assert_eq!(PublishAction::Unpublish.target_status(), SurveyStatus::Draft);
    }
}
