use anyhow::{anyhow, Context};
use chrono::Utc;
use futures::TryStreamExt;
use lazy_static::lazy_static;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::Database;
use thiserror::Error;

use crate::models::survey::{validate_questions, TemplateSource};
use crate::models::template::{
    is_valid_template_id, CreateTemplateRequest, SurveyTemplate, TemplateCatalog,
};

const BUILT_IN_JSON: &str = include_str!("../../data/survey-templates.json");
const DUPLICATE_KEY: i32 = 11000;

lazy_static! {
    static ref BUILT_IN: Vec<SurveyTemplate> = parse_catalog(BUILT_IN_JSON);
}

fn parse_catalog(raw: &str) -> Vec<SurveyTemplate> {
    match serde_json::from_str::<TemplateCatalog>(raw) {
        Ok(catalog) => catalog.templates,
        Err(e) => {
            tracing::error!(error = %e, "Bundled survey templates are malformed");
            Vec::new()
        }
    }
}

/// Templates shipped with the binary
pub fn built_in_templates() -> &'static [SurveyTemplate] {
    &BUILT_IN
}

pub fn find_built_in(id: &str) -> Option<&'static SurveyTemplate> {
    BUILT_IN.iter().find(|t| t.id.trim() == id)
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{0}")]
    Invalid(String),

    #[error("Template id already exists")]
    Duplicate,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Checked id and name of a template about to be created
pub fn validate_new_template(req: &CreateTemplateRequest) -> Result<(String, String), TemplateError> {
    let id = req.id.as_deref().map(str::trim).unwrap_or_default();
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();

    if id.is_empty() || name.is_empty() {
        return Err(TemplateError::Invalid("Missing required fields".to_string()));
    }
    if !is_valid_template_id(id) {
        return Err(TemplateError::Invalid(
            "Template id must be kebab-case".to_string(),
        ));
    }
    if req.questions.is_empty() {
        return Err(TemplateError::Invalid(
            "Template needs at least one question".to_string(),
        ));
    }
    validate_questions(&req.questions).map_err(TemplateError::Invalid)?;

    Ok((id.to_string(), name.to_string()))
}

pub struct TemplateService {
    mongo: Database,
}

impl TemplateService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn templates(&self) -> mongodb::Collection<SurveyTemplate> {
        self.mongo.collection::<SurveyTemplate>("templates")
    }

    /// Stored template by slug, falling back to its database id
    pub async fn find_stored(&self, id: &str) -> anyhow::Result<Option<SurveyTemplate>> {
        let by_slug = self
            .templates()
            .find_one(doc! { "id": id, "isTemplate": true })
            .await
            .context("Failed to query template")?;
        if by_slug.is_some() {
            return Ok(by_slug);
        }

        match ObjectId::parse_str(id) {
            Ok(object_id) => self
                .templates()
                .find_one(doc! { "_id": object_id, "isTemplate": true })
                .await
                .context("Failed to query template"),
            Err(_) => Ok(None),
        }
    }

    pub async fn resolve(
        &self,
        id: &str,
        source: TemplateSource,
    ) -> anyhow::Result<Option<SurveyTemplate>> {
        match source {
            TemplateSource::Local => Ok(find_built_in(id).cloned()),
            TemplateSource::Db => self.find_stored(id).await,
            TemplateSource::Auto => match find_built_in(id) {
                Some(template) => Ok(Some(template.clone())),
                None => self.find_stored(id).await,
            },
        }
    }

    /// Templates created by `owner`, most recently updated first
    pub async fn list_for_owner(&self, owner: ObjectId) -> anyhow::Result<Vec<SurveyTemplate>> {
        self.templates()
            .find(doc! { "isTemplate": true, "createdBy": owner })
            .sort(doc! { "updatedAt": -1, "createdAt": -1 })
            .await
            .context("Failed to query templates")?
            .try_collect()
            .await
            .context("Failed to read templates")
    }

    pub async fn create(
        &self,
        owner: ObjectId,
        req: CreateTemplateRequest,
    ) -> Result<SurveyTemplate, TemplateError> {
        let (id, name) = validate_new_template(&req)?;

        if find_built_in(&id).is_some() || self.find_stored(&id).await?.is_some() {
            return Err(TemplateError::Duplicate);
        }

        let now = Utc::now();
        let mut template = SurveyTemplate {
            object_id: None,
            id,
            title: Some(name.clone()),
            name,
            description: req.description,
            category: req.category,
            icon: req.icon,
            questions: req.questions,
            settings: req.settings,
            is_template: true,
            created_by: Some(owner),
            created_at: Some(now),
            updated_at: Some(now),
        };

        let inserted = match self.templates().insert_one(&template).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => return Err(TemplateError::Duplicate),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to insert template").into()),
        };

        template.object_id = Some(
            inserted
                .inserted_id
                .as_object_id()
                .ok_or_else(|| anyhow!("Inserted template has no ObjectId"))?,
        );

        tracing::info!(template_id = %template.id, owner = %owner, "Template created");
        Ok(template)
    }

    /// Bundled template first, then the collection
    pub async fn get(&self, id: &str) -> anyhow::Result<Option<SurveyTemplate>> {
        self.resolve(id, TemplateSource::Auto).await
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}
