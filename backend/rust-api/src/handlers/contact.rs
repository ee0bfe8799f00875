use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{ApiError, ApiResult},
    extractors::{AppJson, ClientMeta},
    models::contact::{ContactListQuery, ContactRequest},
    services::{contact_service::ContactService, AppState},
    utils::parse_object_id,
};

/// POST /api/contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ClientMeta(client): ClientMeta,
    AppJson(req): AppJson<ContactRequest>,
) -> ApiResult<impl IntoResponse> {
    let req = req.normalized();
    req.validate()?;

    let id = ContactService::new(state.mongo.clone())
        .submit(req, client)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Contact message sent successfully",
            "id": id.to_hex(),
        })),
    ))
}

/// GET /api/admin/contact-messages?page=&limit=
pub async fn list_contact_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit) = query.bounds();
    let response = ContactService::new(state.mongo.clone())
        .list(page, limit)
        .await?;
    Ok(Json(response))
}

/// DELETE /api/admin/contact-messages/{id}
pub async fn delete_contact_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let message_id = parse_object_id(&id, "Invalid message ID")?;

    let deleted = ContactService::new(state.mongo.clone())
        .delete(message_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Contact message not found".into()));
    }

    tracing::info!(message_id = %message_id, "Contact message deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Contact message deleted successfully",
    })))
}
