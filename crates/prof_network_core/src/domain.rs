//! crates/prof_network_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Users are addressed by their unique login name.
pub type UserId = String;

/// Message identifiers are allocated by the store and never reused.
pub type MessageId = i64;

//=========================================================================================
// Users
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

// Only used internally for login and password changes - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: UserId,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Connections
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    /// Pending and Accepted edges both occupy the pair.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionStatus::Pending | ConnectionStatus::Accepted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            "rejected" => Ok(ConnectionStatus::Rejected),
            other => Err(format!("unknown connection status '{other}'")),
        }
    }
}

/// A single connection request between two users.
///
/// The pair is ordered (who asked whom) but accepted edges are read as
/// undirected by the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEdge {
    pub id: i64,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl ConnectionEdge {
    /// Returns the endpoint opposite to `user_id`, if the edge touches it.
    pub fn other_end(&self, user_id: &str) -> Option<&str> {
        if self.requester_id == user_id {
            Some(&self.target_id)
        } else if self.target_id == user_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }
}

/// The target's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

//=========================================================================================
// Messages
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    Draft,
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(MessageStatus::Draft),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(format!("unknown message status '{other}'")),
        }
    }
}

/// A private message between two users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    /// Compose time, refreshed when a draft is sent.
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub sender_deleted: bool,
    pub receiver_deleted: bool,
}

impl Message {
    pub fn visible_to_sender(&self) -> bool {
        !self.sender_deleted
    }

    /// Drafts never reach the receiver.
    pub fn visible_to_receiver(&self) -> bool {
        self.status != MessageStatus::Draft && !self.receiver_deleted
    }
}

/// A message about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
}

//=========================================================================================
// Profile detail records
//=========================================================================================

/// One education entry. `ordinal` is stable for the lifetime of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EducationDetail {
    pub user_id: UserId,
    pub ordinal: i32,
    pub institution_name: String,
    pub major: String,
    pub degree: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct EducationInput {
    pub institution_name: String,
    pub major: String,
    pub degree: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkExperience {
    pub user_id: UserId,
    pub ordinal: i32,
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct WorkExperienceInput {
    pub company: String,
    pub role: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}
