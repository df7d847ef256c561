//! crates/prof_network_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    ConnectionEdge, ConnectionStatus, EducationDetail, EducationInput, Message, MessageId,
    MessageStatus, NewMessage, User, UserCredentials, UserId, WorkExperience,
    WorkExperienceInput,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting record: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Message views
//=========================================================================================

/// The four per-user message listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageView {
    /// Sent by the user, no longer a draft, not deleted by the sender.
    Outgoing,
    /// Addressed to the user, Sent or Delivered, not deleted by the receiver.
    Unread,
    /// Addressed to the user, Read, not deleted by the receiver.
    Read,
    /// The user's own drafts, not deleted.
    Drafts,
}

impl MessageView {
    /// The filter predicate every store must apply for this view.
    pub fn matches(self, message: &Message, user_id: &str) -> bool {
        match self {
            MessageView::Outgoing => {
                message.sender_id == user_id
                    && message.status != MessageStatus::Draft
                    && !message.sender_deleted
            }
            MessageView::Unread => {
                message.receiver_id == user_id
                    && matches!(message.status, MessageStatus::Sent | MessageStatus::Delivered)
                    && !message.receiver_deleted
            }
            MessageView::Read => {
                message.receiver_id == user_id
                    && message.status == MessageStatus::Read
                    && !message.receiver_deleted
            }
            MessageView::Drafts => {
                message.sender_id == user_id
                    && message.status == MessageStatus::Draft
                    && !message.sender_deleted
            }
        }
    }
}

//=========================================================================================
// Transactional store
//=========================================================================================

/// Entry point to the transactional store backing connections and messages.
#[async_trait]
pub trait Store: Send + Sync {
    /// Starts a transaction. Dropping it without `commit` rolls everything back.
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>>;
}

/// The operations available inside one store transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn user_exists(&mut self, user_id: &str) -> PortResult<bool>;

    // --- Connection edges ---

    /// All Pending and Accepted edges, oldest first.
    async fn active_edges(&mut self) -> PortResult<Vec<ConnectionEdge>>;

    /// Inserts a new Pending edge. Stores with a uniqueness constraint on
    /// active pairs report a violation as `PortError::Conflict`.
    async fn insert_edge(&mut self, requester_id: &str, target_id: &str)
        -> PortResult<ConnectionEdge>;

    /// Moves a Pending edge to `status`. An edge that is no longer Pending,
    /// even because a concurrent transaction answered it first, is a
    /// `PortError::Conflict`; Accepted and Rejected edges never change.
    async fn set_edge_status(&mut self, edge_id: i64, status: ConnectionStatus) -> PortResult<()>;

    /// Pending edges aimed at `target_id`, in creation order.
    async fn pending_requests_for(&mut self, target_id: &str) -> PortResult<Vec<ConnectionEdge>>;

    // --- Messages ---

    async fn insert_message(&mut self, message: NewMessage) -> PortResult<Message>;

    /// Fetches a message regardless of its deletion flags. The row stays locked
    /// until the transaction ends, so concurrent writers queue behind it.
    async fn get_message(&mut self, message_id: MessageId) -> PortResult<Message>;

    /// Persists status, timestamp and deletion flags of a message previously
    /// fetched with `get_message` in the same transaction.
    async fn update_message(&mut self, message: &Message) -> PortResult<()>;

    /// Moves every Sent message addressed to `receiver_id` (and not deleted by
    /// it) to Delivered, touching nothing but the status. Returns the count.
    async fn deliver_unread(&mut self, receiver_id: &str) -> PortResult<u64>;

    /// Messages matching `view` for `user_id`, ordered by (sent_at, id).
    async fn list_messages(&mut self, user_id: &str, view: MessageView)
        -> PortResult<Vec<Message>>;

    async fn latest_message_time(&mut self) -> PortResult<Option<DateTime<Utc>>>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}

//=========================================================================================
// Profile directory
//=========================================================================================

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        user_id: &str,
        hashed_password: &str,
        email: &str,
    ) -> PortResult<User>;

    async fn get_user(&self, user_id: &str) -> PortResult<User>;

    async fn get_credentials(&self, user_id: &str) -> PortResult<UserCredentials>;

    /// Replaces the stored hash only if it still equals `old_hash`.
    async fn update_credential(
        &self,
        user_id: &str,
        old_hash: &str,
        new_hash: &str,
    ) -> PortResult<bool>;

    async fn update_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        date_of_birth: Option<NaiveDate>,
    ) -> PortResult<User>;

    /// Users whose id or name contains `fragment`, case-insensitively.
    async fn search_users(&self, fragment: &str) -> PortResult<Vec<User>>;

    // --- Education ---
    async fn list_education(&self, user_id: &str) -> PortResult<Vec<EducationDetail>>;

    async fn add_education(
        &self,
        user_id: &str,
        input: EducationInput,
    ) -> PortResult<EducationDetail>;

    async fn update_education(
        &self,
        user_id: &str,
        ordinal: i32,
        input: EducationInput,
    ) -> PortResult<EducationDetail>;

    async fn delete_education(&self, user_id: &str, ordinal: i32) -> PortResult<()>;

    // --- Work experience ---
    async fn list_work_experience(&self, user_id: &str) -> PortResult<Vec<WorkExperience>>;

    async fn add_work_experience(
        &self,
        user_id: &str,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience>;

    async fn update_work_experience(
        &self,
        user_id: &str,
        ordinal: i32,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience>;

    async fn delete_work_experience(&self, user_id: &str, ordinal: i32) -> PortResult<()>;
}

//=========================================================================================
// Login sessions
//=========================================================================================

#[async_trait]
pub trait AuthSessionStore: Send + Sync {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to its user; expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<UserId>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
