use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::metrics::track_db_operation;
use crate::models::contact::{
    ContactListResponse, ContactMessage, ContactMessageView, ContactRequest, Pagination,
};
use crate::services::collector::ClientInfo;

pub struct ContactService {
    mongo: Database,
}

/// Number of pages needed for `total` items; 0 when there are none
pub fn page_count(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit.max(1))
}

impl ContactService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn messages(&self) -> mongodb::Collection<ContactMessage> {
        self.mongo.collection::<ContactMessage>("contact-messages")
    }

    /// Stores an already validated and normalized message.
    pub async fn submit(&self, req: ContactRequest, client: ClientInfo) -> Result<ObjectId> {
        let message = ContactMessage {
            id: None,
            name: req.name,
            email: req.email,
            company: req.company,
            subject: req.subject,
            message: req.message,
            created_at: Utc::now(),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        };

        let inserted = track_db_operation("insert_one", "contact-messages", async {
            self.messages()
                .insert_one(&message)
                .await
                .context("Failed to insert contact message")
        })
        .await?;

        let id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("Inserted contact message has no ObjectId"))?;

        tracing::info!(message_id = %id, subject = %message.subject, "Contact message received");
        Ok(id)
    }

    /// Newest first
    pub async fn list(&self, page: u64, limit: u64) -> Result<ContactListResponse> {
        let skip = (page.saturating_sub(1)) * limit;

        let (messages, total) = tokio::try_join!(
            async {
                self.messages()
                    .find(doc! {})
                    .sort(doc! { "createdAt": -1 })
                    .skip(skip)
                    .limit(limit as i64)
                    .await
                    .context("Failed to query contact messages")?
                    .try_collect::<Vec<_>>()
                    .await
                    .context("Failed to read contact messages")
            },
            async {
                self.messages()
                    .count_documents(doc! {})
                    .await
                    .context("Failed to count contact messages")
            },
        )?;

        Ok(ContactListResponse {
            messages: messages.into_iter().map(ContactMessageView::from).collect(),
            pagination: Pagination {
                page,
                limit,
                total,
                pages: page_count(total, limit),
            },
        })
    }

    /// Returns false when no message had that id.
    pub async fn delete(&self, id: ObjectId) -> Result<bool> {
        let result = self
            .messages()
            .delete_one(doc! { "_id": id })
            .await
            .context("Failed to delete contact message")?;
        Ok(result.deleted_count > 0)
    }
}
