pub mod auth;
pub mod connections;
pub mod messages;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::{AppState, CurrentUser};

/// Builds every API route. All but the `/auth` routes sit behind `require_auth`.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/profile", put(profile::update_profile_handler))
        .route("/profile/password", put(auth::change_password_handler))
        .route(
            "/profile/education",
            get(profile::list_education_handler).post(profile::add_education_handler),
        )
        .route(
            "/profile/education/{ordinal}",
            put(profile::update_education_handler).delete(profile::delete_education_handler),
        )
        .route(
            "/profile/experience",
            get(profile::list_experience_handler).post(profile::add_experience_handler),
        )
        .route(
            "/profile/experience/{ordinal}",
            put(profile::update_experience_handler).delete(profile::delete_experience_handler),
        )
        .route("/profile/{user_id}", get(profile::get_profile_handler))
        .route("/users", get(profile::search_users_handler))
        .route(
            "/connections/requests",
            get(connections::list_requests_handler).post(connections::send_request_handler),
        )
        .route(
            "/connections/requests/{requester}/accept",
            post(connections::accept_request_handler),
        )
        .route(
            "/connections/requests/{requester}/reject",
            post(connections::reject_request_handler),
        )
        .route("/connections/{user_id}", get(connections::list_connections_handler))
        .route(
            "/connections/{user_id}/reachable",
            get(connections::reachable_handler),
        )
        .route("/messages", post(messages::compose_handler))
        .route("/messages/outgoing", get(messages::list_outgoing_handler))
        .route("/messages/unread", get(messages::list_unread_handler))
        .route("/messages/read", get(messages::list_read_handler))
        .route("/messages/drafts", get(messages::list_drafts_handler))
        .route("/messages/{id}", get(messages::open_handler))
        .route("/messages/{id}/send", post(messages::send_draft_handler))
        .route("/messages/{id}/read", post(messages::mark_read_handler))
        .route("/messages/{id}/sent", delete(messages::delete_sent_handler))
        .route("/messages/{id}/received", delete(messages::delete_received_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
