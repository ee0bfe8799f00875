use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Message stored in MongoDB "contact-messages" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub subject: String,
    pub message: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessageView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<ContactMessage> for ContactMessageView {
    fn from(message: ContactMessage) -> Self {
        ContactMessageView {
            id: message.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: message.name,
            email: message.email,
            company: message.company,
            subject: message.subject,
            message: message.message,
            created_at: message.created_at,
            ip_address: message.ip_address,
            user_agent: message.user_agent,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, message = "Name, email, subject, and message are required"))]
    #[serde(default)]
    pub name: String,
    #[validate(email(message = "Please provide a valid email address"))]
    #[serde(default)]
    pub email: String,
    pub company: Option<String>,
    #[validate(length(min = 1, message = "Name, email, subject, and message are required"))]
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 1, message = "Name, email, subject, and message are required"))]
    #[serde(default)]
    pub message: String,
}

impl ContactRequest {
    /// Trims every field and lower-cases the email; blank company becomes None.
    pub fn normalized(self) -> Self {
        ContactRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            company: self
                .company
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ContactListQuery {
    /// `(page, limit)` with page >= 1 and limit clamped to 1..=100
    pub fn bounds(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1) as u64;
        let limit = self.limit.unwrap_or(20).clamp(1, 100) as u64;
        (page, limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub messages: Vec<ContactMessageView>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalized_then_validated() {
        let request: ContactRequest = serde_json::from_value(json!({
            "name": "  Ada ",
            "email": " ADA@Example.COM ",
            "company": "   ",
            "subject": "Hello",
            "message": " Hi there "
        }))
        .unwrap();

        let request = request.normalized();
        assert_eq!(request.email, "ada@example.com");
        assert_eq!(request.name, "Ada");
        assert!(request.company.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let request: ContactRequest = serde_json::from_value(json!({
            "name": "   ",
            "email": "ada@example.com",
            "subject": "Hello",
            "message": "Hi"
        }))
        .unwrap();
        assert!(request.normalized().validate().is_err());
    }

    #[test]
    fn test_pagination_bounds() {
        let query = ContactListQuery {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(query.bounds(), (1, 100));

        let defaults = ContactListQuery {
            page: None,
            limit: None,
        };
        assert_eq!(defaults.bounds(), (1, 20));
    }
}
