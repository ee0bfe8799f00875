use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono_option;
use super::survey::{Question, SurveySettings};

lazy_static! {
    static ref TEMPLATE_ID_RE: Regex = Regex::new(r"^[a-z0-9-]+$").expect("valid regex");
}

/// Survey template, either bundled with the binary or stored in the
/// "templates" collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyTemplate {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectId>,
    /// Kebab-case slug
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: SurveySettings,
    #[serde(default = "default_is_template")]
    pub is_template: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ObjectId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_is_template() -> bool {
    true
}

impl SurveyTemplate {
    /// Title given to surveys created from this template
    pub fn survey_title(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else {
            self.title.as_deref().unwrap_or("Untitled")
        }
    }
}

/// Template as returned over the API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    /// Database id, absent for bundled templates
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub questions: Vec<Question>,
    pub settings: SurveySettings,
    pub built_in: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<SurveyTemplate> for TemplateView {
    fn from(template: SurveyTemplate) -> Self {
        TemplateView {
            built_in: template.object_id.is_none(),
            object_id: template.object_id.map(|id| id.to_hex()),
            id: template.id,
            name: template.name,
            title: template.title,
            description: template.description,
            category: template.category,
            icon: template.icon,
            questions: template.questions,
            settings: template.settings,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

/// Bundled templates file layout
#[derive(Debug, Deserialize)]
pub struct TemplateCatalog {
    pub templates: Vec<SurveyTemplate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: SurveySettings,
}

pub fn is_valid_template_id(id: &str) -> bool {
    TEMPLATE_ID_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_id_must_be_kebab_case() {
        assert!(is_valid_template_id("customer-satisfaction"));
        assert!(is_valid_template_id("nps-2024"));
        assert!(!is_valid_template_id("Customer Satisfaction"));
        assert!(!is_valid_template_id("snake_case"));
        assert!(!is_valid_template_id(""));
    }

    #[test]
    fn test_bundled_template_shape() {
        let template: SurveyTemplate = serde_json::from_value(json!({
            "id": "quick-poll",
            "name": "Quick Poll",
            "description": "One question",
            "questions": [{ "id": "q1", "type": "multiple-choice", "question": "Pick one", "options": ["A", "B"] }]
        }))
        .unwrap();

        assert!(template.is_template);
        assert_eq!(template.survey_title(), "Quick Poll");

        let view = TemplateView::from(template);
        assert!(view.built_in);
        assert!(view.object_id.is_none());
    }
}
