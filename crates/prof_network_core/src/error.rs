//! crates/prof_network_core/src/error.rs
//!
//! The named error kinds returned by every core service operation.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A referenced user, edge or message is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is not the owning party.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate active edge or another invariant violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("User '{target}' is beyond connection degree {max_degree}")]
    OutOfDegree { target: String, max_degree: usize },

    #[error("A user cannot connect to themselves")]
    SelfReference,

    #[error("Message body is empty")]
    EmptyBody,

    #[error("Receiver '{0}' does not exist")]
    InvalidReceiver(String),

    /// The enclosing transaction was aborted.
    #[error("Store failure: {0}")]
    StoreFailure(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<PortError> for NetworkError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => NetworkError::NotFound(what),
            PortError::Conflict(what) => NetworkError::Conflict(what),
            other => NetworkError::StoreFailure(other.to_string()),
        }
    }
}
