//! services/api/src/web/rest.rs
//!
//! Contains the master definition for the OpenAPI specification and the
//! translation of core errors into HTTP responses shared by every handler.

use axum::http::StatusCode;
use prof_network_core::{NetworkError, PortError};
use tracing::{error, warn};
use utoipa::OpenApi;

use crate::web::{auth, connections, messages, profile};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::change_password_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::search_users_handler,
        profile::list_education_handler,
        profile::add_education_handler,
        profile::update_education_handler,
        profile::delete_education_handler,
        profile::list_experience_handler,
        profile::add_experience_handler,
        profile::update_experience_handler,
        profile::delete_experience_handler,
        connections::list_connections_handler,
        connections::reachable_handler,
        connections::send_request_handler,
        connections::list_requests_handler,
        connections::accept_request_handler,
        connections::reject_request_handler,
        messages::compose_handler,
        messages::list_outgoing_handler,
        messages::list_unread_handler,
        messages::list_read_handler,
        messages::list_drafts_handler,
        messages::send_draft_handler,
        messages::mark_read_handler,
        messages::open_handler,
        messages::delete_sent_handler,
        messages::delete_received_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::AuthResponse,
            profile::ProfileResponse,
            profile::UpdateProfileRequest,
            profile::UserSummary,
            profile::EducationPayload,
            profile::EducationResponse,
            profile::ExperiencePayload,
            profile::ExperienceResponse,
            connections::ConnectionRequestPayload,
            connections::EdgeResponse,
            connections::ReachabilityResponse,
            messages::ComposeRequest,
            messages::MessageResponse,
        )
    ),
    tags(
        (name = "Professional Network API", description = "Profiles, connection requests and private messages.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Translation
//=========================================================================================

/// Maps a core error onto the status code and message returned to the client.
pub fn error_response(err: NetworkError) -> (StatusCode, String) {
    let status = match &err {
        NetworkError::NotFound(_) => StatusCode::NOT_FOUND,
        NetworkError::Forbidden(_) => StatusCode::FORBIDDEN,
        NetworkError::Conflict(_) => StatusCode::CONFLICT,
        NetworkError::OutOfDegree { .. }
        | NetworkError::SelfReference
        | NetworkError::EmptyBody
        | NetworkError::InvalidReceiver(_) => StatusCode::UNPROCESSABLE_ENTITY,
        NetworkError::StoreFailure(_) => {
            error!("Store failure: {:?}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    warn!("Request rejected: {}", err);
    (status, err.to_string())
}

/// Same as [`error_response`] for calls made straight against a port.
pub fn port_error_response(err: PortError) -> (StatusCode, String) {
    error_response(err.into())
}
