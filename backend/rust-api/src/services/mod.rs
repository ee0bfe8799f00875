use crate::config::Config;
use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use crate::models::{
    contact::ContactMessage, response::SurveyResponse, survey::Survey, template::SurveyTemplate,
    user::User,
};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    /// Connections are opened on demand; Redis being down only disables
    /// rate limiting and login lockout.
    pub redis: redis::Client,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, mongo_client: MongoClient, redis_client: redis::Client) -> Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            mongo,
            redis: redis_client,
            http,
        })
    }

    pub async fn redis_connection(&self) -> Result<MultiplexedConnection> {
        connect_redis(&self.redis).await
    }
}

pub async fn connect_redis(client: &redis::Client) -> Result<MultiplexedConnection> {
    tokio::time::timeout(REDIS_CONNECT_TIMEOUT, client.get_multiplexed_async_connection())
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 2s"))?
        .context("Failed to connect to Redis")
}

/// Creates the indexes the query paths rely on. Safe to run repeatedly.
pub async fn ensure_indexes(mongo: &Database) -> Result<()> {
    mongo
        .collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await
        .context("Failed to create users.email index")?;

    mongo
        .collection::<Survey>("surveys")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "createdBy": 1, "createdAt": -1 })
                .build(),
        )
        .await
        .context("Failed to create surveys.createdBy index")?;

    mongo
        .collection::<SurveyResponse>("responses")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "surveyId": 1, "createdAt": -1 })
                .build(),
        )
        .await
        .context("Failed to create responses.surveyId index")?;

    mongo
        .collection::<SurveyTemplate>("templates")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await
        .context("Failed to create templates.id index")?;

    mongo
        .collection::<ContactMessage>("contact-messages")
        .create_index(IndexModel::builder().keys(doc! { "createdAt": -1 }).build())
        .await
        .context("Failed to create contact-messages.createdAt index")?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

pub mod analytics;
pub mod auth_service;
pub mod collector;
pub mod contact_service;
pub mod narrative_service;
pub mod response_service;
pub mod survey_service;
pub mod template_service;
pub mod text_summary;
