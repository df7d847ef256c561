//! services/api/src/web/connections.rs
//!
//! Connection endpoints: sending and answering requests, listing connections
//! and checking reachability.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use prof_network_core::{ConnectionEdge, Decision};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::rest::error_response;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ConnectionRequestPayload {
    pub target_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct EdgeResponse {
    pub id: i64,
    pub requester_id: String,
    pub target_id: String,
    /// `pending`, `accepted` or `rejected`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<ConnectionEdge> for EdgeResponse {
    fn from(edge: ConnectionEdge) -> Self {
        Self {
            id: edge.id,
            requester_id: edge.requester_id,
            target_id: edge.target_id,
            status: edge.status.to_string(),
            created_at: edge.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReachabilityResponse {
    pub user_id: String,
    pub reachable: bool,
    /// Hop count, present only when reachable.
    pub degree: Option<usize>,
    pub max_degree: usize,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /connections/{user_id} - Direct connections of a user
#[utoipa::path(
    get,
    path = "/connections/{user_id}",
    params(("user_id" = String, Path, description = "Whose connections to list.")),
    responses(
        (status = 200, description = "Connected user ids, sorted", body = [String]),
        (status = 404, description = "No such user")
    )
)]
pub async fn list_connections_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let connections = state
        .connections
        .list_connections(&user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(connections))
}

/// GET /connections/{user_id}/reachable - Whether the caller may request this user
#[utoipa::path(
    get,
    path = "/connections/{user_id}/reachable",
    params(("user_id" = String, Path, description = "The prospective target.")),
    responses((status = 200, description = "Reachability from the caller", body = ReachabilityResponse))
)]
pub async fn reachable_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let degree = state
        .connections
        .connection_degree(&me, &user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ReachabilityResponse {
        user_id,
        reachable: degree.is_some(),
        degree,
        max_degree: state.connections.policy().max_degree,
    }))
}

/// POST /connections/requests - Ask another user to connect
#[utoipa::path(
    post,
    path = "/connections/requests",
    request_body = ConnectionRequestPayload,
    responses(
        (status = 201, description = "Request pending", body = EdgeResponse),
        (status = 404, description = "No such user"),
        (status = 409, description = "An active edge already joins the pair"),
        (status = 422, description = "Self request or target beyond the degree limit")
    )
)]
pub async fn send_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Json(payload): Json<ConnectionRequestPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let edge = state
        .connections
        .send_request(&me, payload.target_id.trim())
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(EdgeResponse::from(edge))))
}

/// GET /connections/requests - Pending requests addressed to the caller
#[utoipa::path(
    get,
    path = "/connections/requests",
    responses((status = 200, description = "Requester ids, oldest first", body = [String]))
)]
pub async fn list_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let requesters = state
        .connections
        .list_incoming_requests(&me)
        .await
        .map_err(error_response)?;
    Ok(Json(requesters))
}

/// POST /connections/requests/{requester}/accept - Accept a pending request
#[utoipa::path(
    post,
    path = "/connections/requests/{requester}/accept",
    params(("requester" = String, Path, description = "Who sent the request.")),
    responses(
        (status = 200, description = "Now connected", body = EdgeResponse),
        (status = 403, description = "Only the target may answer"),
        (status = 404, description = "No pending request")
    )
)]
pub async fn accept_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(requester): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    respond(&state, &me, &requester, Decision::Accept).await
}

/// POST /connections/requests/{requester}/reject - Reject a pending request
#[utoipa::path(
    post,
    path = "/connections/requests/{requester}/reject",
    params(("requester" = String, Path, description = "Who sent the request.")),
    responses(
        (status = 200, description = "Request rejected", body = EdgeResponse),
        (status = 403, description = "Only the target may answer"),
        (status = 404, description = "No pending request")
    )
)]
pub async fn reject_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(requester): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    respond(&state, &me, &requester, Decision::Reject).await
}

async fn respond(
    state: &AppState,
    me: &str,
    requester: &str,
    decision: Decision,
) -> Result<Json<EdgeResponse>, (StatusCode, String)> {
    let edge = state
        .connections
        .respond(me, requester, decision)
        .await
        .map_err(error_response)?;
    Ok(Json(EdgeResponse::from(edge)))
}
