//! services/api/src/web/messages.rs
//!
//! Private messaging endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use prof_network_core::{Message, MessageId, NetworkResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::rest::error_response;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ComposeRequest {
    pub receiver_id: String,
    pub body: String,
    /// Keep the message as a draft instead of sending it.
    #[serde(default)]
    pub draft: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// `draft`, `sent`, `delivered` or `read`.
    pub status: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body,
            sent_at: message.sent_at,
            status: message.status.to_string(),
        }
    }
}

fn listing(
    result: NetworkResult<Vec<Message>>,
) -> Result<Json<Vec<MessageResponse>>, (StatusCode, String)> {
    let messages = result.map_err(error_response)?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

//=========================================================================================
// Compose and Listing Handlers
//=========================================================================================

/// POST /messages - Compose a message, sent immediately or kept as a draft
#[utoipa::path(
    post,
    path = "/messages",
    request_body = ComposeRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageResponse),
        (status = 422, description = "Empty body or unknown receiver")
    )
)]
pub async fn compose_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Json(req): Json<ComposeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = state
        .messages
        .compose(&me, req.receiver_id.trim(), &req.body, req.draft)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// GET /messages/outgoing - Messages the caller has sent
#[utoipa::path(
    get,
    path = "/messages/outgoing",
    responses((status = 200, description = "Oldest first", body = [MessageResponse]))
)]
pub async fn list_outgoing_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    listing(state.messages.list_outgoing(&me).await)
}

/// GET /messages/unread - Unread messages addressed to the caller
///
/// Listing marks every returned message as delivered.
#[utoipa::path(
    get,
    path = "/messages/unread",
    responses((status = 200, description = "Oldest first", body = [MessageResponse]))
)]
pub async fn list_unread_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    listing(state.messages.list_unread(&me).await)
}

/// GET /messages/read - Messages the caller has already read
#[utoipa::path(
    get,
    path = "/messages/read",
    responses((status = 200, description = "Oldest first", body = [MessageResponse]))
)]
pub async fn list_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    listing(state.messages.list_read(&me).await)
}

/// GET /messages/drafts - The caller's unsent drafts
#[utoipa::path(
    get,
    path = "/messages/drafts",
    responses((status = 200, description = "Oldest first", body = [MessageResponse]))
)]
pub async fn list_drafts_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    listing(state.messages.list_drafts(&me).await)
}

//=========================================================================================
// Single Message Handlers
//=========================================================================================

/// POST /messages/{id}/send - Send one of the caller's drafts
#[utoipa::path(
    post,
    path = "/messages/{id}/send",
    params(("id" = i64, Path, description = "Message id.")),
    responses(
        (status = 200, description = "Draft sent", body = MessageResponse),
        (status = 403, description = "Not the caller's draft"),
        (status = 404, description = "No such draft")
    )
)]
pub async fn send_draft_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<MessageId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = state
        .messages
        .send_draft(&me, id)
        .await
        .map_err(error_response)?;
    Ok(Json(MessageResponse::from(message)))
}

/// POST /messages/{id}/read - Mark a received message as read
#[utoipa::path(
    post,
    path = "/messages/{id}/read",
    params(("id" = i64, Path, description = "Message id.")),
    responses(
        (status = 200, description = "Message read", body = MessageResponse),
        (status = 403, description = "Caller is not the receiver"),
        (status = 404, description = "No such message")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<MessageId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = state
        .messages
        .mark_read(&me, id)
        .await
        .map_err(error_response)?;
    Ok(Json(MessageResponse::from(message)))
}

/// GET /messages/{id} - Open a message; the receiver opening it reads it
#[utoipa::path(
    get,
    path = "/messages/{id}",
    params(("id" = i64, Path, description = "Message id.")),
    responses(
        (status = 200, description = "The message", body = MessageResponse),
        (status = 403, description = "Caller is not a party to the message"),
        (status = 404, description = "No such message")
    )
)]
pub async fn open_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<MessageId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = state.messages.open(&me, id).await.map_err(error_response)?;
    Ok(Json(MessageResponse::from(message)))
}

/// DELETE /messages/{id}/sent - Hide a message from the sender's views
#[utoipa::path(
    delete,
    path = "/messages/{id}/sent",
    params(("id" = i64, Path, description = "Message id.")),
    responses(
        (status = 204, description = "Hidden from the sender"),
        (status = 403, description = "Caller is not the sender"),
        (status = 404, description = "No such message")
    )
)]
pub async fn delete_sent_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<MessageId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .messages
        .delete_as_sender(&me, id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /messages/{id}/received - Hide a message from the receiver's views
#[utoipa::path(
    delete,
    path = "/messages/{id}/received",
    params(("id" = i64, Path, description = "Message id.")),
    responses(
        (status = 204, description = "Hidden from the receiver"),
        (status = 403, description = "Caller is not the receiver"),
        (status = 404, description = "No such message")
    )
)]
pub async fn delete_received_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(id): Path<MessageId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .messages
        .delete_as_receiver(&me, id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
