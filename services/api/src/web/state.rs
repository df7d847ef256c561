//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request user context.

use crate::config::Config;
use prof_network_core::{
    AuthSessionStore, ConnectionPolicy, ConnectionRequestService, MessageStore, ProfileDirectory,
    ProfileService, Store, UserId,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn ProfileDirectory>,
    pub sessions: Arc<dyn AuthSessionStore>,
    pub connections: ConnectionRequestService,
    pub messages: MessageStore,
    pub profiles: ProfileService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every service onto one adapter implementing all persistence ports.
    pub fn new<A>(config: Arc<Config>, adapter: Arc<A>) -> Self
    where
        A: Store + ProfileDirectory + AuthSessionStore + 'static,
    {
        let policy = ConnectionPolicy {
            max_degree: config.max_connection_degree,
            allow_isolated_requesters: config.allow_isolated_requests,
        };
        let connections = ConnectionRequestService::with_policy(adapter.clone(), policy);
        let profiles = ProfileService::new(adapter.clone(), connections.clone());

        Self {
            directory: adapter.clone(),
            sessions: adapter.clone(),
            connections,
            messages: MessageStore::new(adapter),
            profiles,
            config,
        }
    }
}

//=========================================================================================
// CurrentUser (Specific to One Authenticated Request)
//=========================================================================================

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);
