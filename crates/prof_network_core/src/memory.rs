//! crates/prof_network_core/src/memory.rs
//!
//! An in-memory adapter implementing every port. Transactions take the state
//! lock for their whole lifetime and work on a copy, so an uncommitted
//! transaction leaves nothing behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    AuthSession, ConnectionEdge, ConnectionStatus, EducationDetail, EducationInput, Message,
    MessageId, MessageStatus, NewMessage, User, UserCredentials, UserId, WorkExperience,
    WorkExperienceInput,
};
use crate::ports::{
    AuthSessionStore, MessageView, PortError, PortResult, ProfileDirectory, Store,
    StoreTransaction,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, StoredUser>,
    edges: Vec<ConnectionEdge>,
    messages: BTreeMap<MessageId, Message>,
    last_edge_id: i64,
    last_message_id: MessageId,
    education: Vec<EducationDetail>,
    work_experience: Vec<WorkExperience>,
    last_education_ordinal: HashMap<UserId, i32>,
    last_work_ordinal: HashMap<UserId, i32>,
    sessions: HashMap<String, AuthSession>,
}

impl MemoryState {
    fn require_user(&self, user_id: &str) -> PortResult<&StoredUser> {
        self.users
            .get(user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Shared handle; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn user_exists(&mut self, user_id: &str) -> PortResult<bool> {
        Ok(self.working.users.contains_key(user_id))
    }

    async fn active_edges(&mut self) -> PortResult<Vec<ConnectionEdge>> {
        Ok(self
            .working
            .edges
            .iter()
            .filter(|edge| edge.status.is_active())
            .cloned()
            .collect())
    }

    async fn insert_edge(
        &mut self,
        requester_id: &str,
        target_id: &str,
    ) -> PortResult<ConnectionEdge> {
        let occupied = self.working.edges.iter().any(|edge| {
            edge.status.is_active() && edge.other_end(requester_id) == Some(target_id)
        });
        if occupied {
            return Err(PortError::Conflict(format!(
                "active edge between {} and {} already exists",
                requester_id, target_id
            )));
        }

        self.working.last_edge_id += 1;
        let edge = ConnectionEdge {
            id: self.working.last_edge_id,
            requester_id: requester_id.to_owned(),
            target_id: target_id.to_owned(),
            status: ConnectionStatus::Pending,
            created_at: Utc::now(),
        };
        self.working.edges.push(edge.clone());
        Ok(edge)
    }

    async fn set_edge_status(&mut self, edge_id: i64, status: ConnectionStatus) -> PortResult<()> {
        let edge = self
            .working
            .edges
            .iter_mut()
            .find(|edge| edge.id == edge_id)
            .ok_or_else(|| PortError::NotFound(format!("Edge {} not found", edge_id)))?;
        if edge.status != ConnectionStatus::Pending {
            return Err(PortError::Conflict(format!(
                "Edge {} is already {}",
                edge_id, edge.status
            )));
        }
        edge.status = status;
        Ok(())
    }

    async fn pending_requests_for(&mut self, target_id: &str) -> PortResult<Vec<ConnectionEdge>> {
        Ok(self
            .working
            .edges
            .iter()
            .filter(|edge| edge.target_id == target_id && edge.status == ConnectionStatus::Pending)
            .cloned()
            .collect())
    }

    async fn insert_message(&mut self, message: NewMessage) -> PortResult<Message> {
        self.working.last_message_id += 1;
        let stored = Message {
            id: self.working.last_message_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body: message.body,
            sent_at: message.sent_at,
            status: message.status,
            sender_deleted: false,
            receiver_deleted: false,
        };
        self.working.messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_message(&mut self, message_id: MessageId) -> PortResult<Message> {
        self.working
            .messages
            .get(&message_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Message {} not found", message_id)))
    }

    async fn update_message(&mut self, message: &Message) -> PortResult<()> {
        let stored = self
            .working
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| PortError::NotFound(format!("Message {} not found", message.id)))?;
        stored.status = message.status;
        stored.sent_at = message.sent_at;
        stored.sender_deleted = message.sender_deleted;
        stored.receiver_deleted = message.receiver_deleted;
        Ok(())
    }

    async fn deliver_unread(&mut self, receiver_id: &str) -> PortResult<u64> {
        let mut delivered = 0;
        for message in self.working.messages.values_mut().filter(|m| {
            m.receiver_id == receiver_id && m.status == MessageStatus::Sent && !m.receiver_deleted
        }) {
            message.status = MessageStatus::Delivered;
            delivered += 1;
        }
        Ok(delivered)
    }

    async fn list_messages(&mut self, user_id: &str, view: MessageView) -> PortResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .working
            .messages
            .values()
            .filter(|message| view.matches(message, user_id))
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.sent_at, a.id).cmp(&(b.sent_at, b.id)));
        Ok(messages)
    }

    async fn latest_message_time(&mut self) -> PortResult<Option<DateTime<Utc>>> {
        Ok(self.working.messages.values().map(|m| m.sent_at).max())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryStore {
    async fn create_user(
        &self,
        user_id: &str,
        hashed_password: &str,
        email: &str,
    ) -> PortResult<User> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(user_id) {
            return Err(PortError::Conflict(format!("User {} already exists", user_id)));
        }
        let user = User {
            user_id: user_id.to_owned(),
            email: email.to_owned(),
            name: None,
            date_of_birth: None,
        };
        state.users.insert(
            user_id.to_owned(),
            StoredUser {
                user: user.clone(),
                hashed_password: hashed_password.to_owned(),
            },
        );
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        let state = self.state.lock().await;
        Ok(state.require_user(user_id)?.user.clone())
    }

    async fn get_credentials(&self, user_id: &str) -> PortResult<UserCredentials> {
        let state = self.state.lock().await;
        let stored = state.require_user(user_id)?;
        Ok(UserCredentials {
            user_id: stored.user.user_id.clone(),
            email: stored.user.email.clone(),
            hashed_password: stored.hashed_password.clone(),
        })
    }

    async fn update_credential(
        &self,
        user_id: &str,
        old_hash: &str,
        new_hash: &str,
    ) -> PortResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(user_id) {
            Some(stored) if stored.hashed_password == old_hash => {
                stored.hashed_password = new_hash.to_owned();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        date_of_birth: Option<NaiveDate>,
    ) -> PortResult<User> {
        let mut state = self.state.lock().await;
        let stored = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.user.name = name;
        stored.user.date_of_birth = date_of_birth;
        Ok(stored.user.clone())
    }

    async fn search_users(&self, fragment: &str) -> PortResult<Vec<User>> {
        let needle = fragment.to_lowercase();
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .map(|stored| &stored.user)
            .filter(|user| {
                user.user_id.to_lowercase().contains(&needle)
                    || user
                        .name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn list_education(&self, user_id: &str) -> PortResult<Vec<EducationDetail>> {
        let state = self.state.lock().await;
        let mut details: Vec<EducationDetail> = state
            .education
            .iter()
            .filter(|detail| detail.user_id == user_id)
            .cloned()
            .collect();
        details.sort_by(|a, b| (a.start_date, a.ordinal).cmp(&(b.start_date, b.ordinal)));
        Ok(details)
    }

    async fn add_education(
        &self,
        user_id: &str,
        input: EducationInput,
    ) -> PortResult<EducationDetail> {
        let mut state = self.state.lock().await;
        state.require_user(user_id)?;
        let ordinal = state
            .last_education_ordinal
            .entry(user_id.to_owned())
            .or_insert(0);
        *ordinal += 1;
        let detail = EducationDetail {
            user_id: user_id.to_owned(),
            ordinal: *ordinal,
            institution_name: input.institution_name,
            major: input.major,
            degree: input.degree,
            start_date: input.start_date,
            end_date: input.end_date,
        };
        state.education.push(detail.clone());
        Ok(detail)
    }

    async fn update_education(
        &self,
        user_id: &str,
        ordinal: i32,
        input: EducationInput,
    ) -> PortResult<EducationDetail> {
        let mut state = self.state.lock().await;
        let detail = state
            .education
            .iter_mut()
            .find(|detail| detail.user_id == user_id && detail.ordinal == ordinal)
            .ok_or_else(|| {
                PortError::NotFound(format!("Education entry {} not found", ordinal))
            })?;
        detail.institution_name = input.institution_name;
        detail.major = input.major;
        detail.degree = input.degree;
        detail.start_date = input.start_date;
        detail.end_date = input.end_date;
        Ok(detail.clone())
    }

    async fn delete_education(&self, user_id: &str, ordinal: i32) -> PortResult<()> {
        let mut state = self.state.lock().await;
        let before = state.education.len();
        state
            .education
            .retain(|detail| !(detail.user_id == user_id && detail.ordinal == ordinal));
        if state.education.len() == before {
            return Err(PortError::NotFound(format!(
                "Education entry {} not found",
                ordinal
            )));
        }
        Ok(())
    }

    async fn list_work_experience(&self, user_id: &str) -> PortResult<Vec<WorkExperience>> {
        let state = self.state.lock().await;
        let mut entries: Vec<WorkExperience> = state
            .work_experience
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.start_date, a.ordinal).cmp(&(b.start_date, b.ordinal)));
        Ok(entries)
    }

    async fn add_work_experience(
        &self,
        user_id: &str,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience> {
        let mut state = self.state.lock().await;
        state.require_user(user_id)?;
        let ordinal = state
            .last_work_ordinal
            .entry(user_id.to_owned())
            .or_insert(0);
        *ordinal += 1;
        let entry = WorkExperience {
            user_id: user_id.to_owned(),
            ordinal: *ordinal,
            company: input.company,
            role: input.role,
            location: input.location,
            start_date: input.start_date,
            end_date: input.end_date,
        };
        state.work_experience.push(entry.clone());
        Ok(entry)
    }

    async fn update_work_experience(
        &self,
        user_id: &str,
        ordinal: i32,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience> {
        let mut state = self.state.lock().await;
        let entry = state
            .work_experience
            .iter_mut()
            .find(|entry| entry.user_id == user_id && entry.ordinal == ordinal)
            .ok_or_else(|| {
                PortError::NotFound(format!("Work experience entry {} not found", ordinal))
            })?;
        entry.company = input.company;
        entry.role = input.role;
        entry.location = input.location;
        entry.start_date = input.start_date;
        entry.end_date = input.end_date;
        Ok(entry.clone())
    }

    async fn delete_work_experience(&self, user_id: &str, ordinal: i32) -> PortResult<()> {
        let mut state = self.state.lock().await;
        let before = state.work_experience.len();
        state
            .work_experience
            .retain(|entry| !(entry.user_id == user_id && entry.ordinal == ordinal));
        if state.work_experience.len() == before {
            return Err(PortError::NotFound(format!(
                "Work experience entry {} not found",
                ordinal
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthSessionStore for MemoryStore {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state.lock().await;
        state.sessions.insert(
            session_id.to_owned(),
            AuthSession {
                id: session_id.to_owned(),
                user_id: user_id.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<UserId> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or(PortError::Unauthorized)?;
        if session.expires_at <= Utc::now() {
            state.sessions.remove(session_id);
            return Err(PortError::Unauthorized);
        }
        Ok(session.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut state = self.state.lock().await;
        state.sessions.remove(session_id);
        Ok(())
    }
}
