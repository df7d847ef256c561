//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `Store`, `ProfileDirectory` and `AuthSessionStore` ports from the `core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use prof_network_core::domain::{
    ConnectionEdge, ConnectionStatus, EducationDetail, EducationInput, Message, MessageId,
    NewMessage, User, UserCredentials, UserId, WorkExperience, WorkExperienceInput,
};
use prof_network_core::ports::{
    AuthSessionStore, MessageView, PortError, PortResult, ProfileDirectory, Store,
    StoreTransaction,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every persistence port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps driver errors onto port errors. Unique violations are conflicts and
/// dangling foreign keys mean the referenced user does not exist.
fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            PortError::NotFound(db.message().to_string())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => port_error(other),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: String,
    email: String,
    name: Option<String>,
    date_of_birth: Option<NaiveDate>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            date_of_birth: self.date_of_birth,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: String,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct EdgeRecord {
    id: i64,
    requester_id: String,
    target_id: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl EdgeRecord {
    fn to_domain(self) -> PortResult<ConnectionEdge> {
        Ok(ConnectionEdge {
            id: self.id,
            requester_id: self.requester_id,
            target_id: self.target_id,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    sender_id: String,
    receiver_id: String,
    body: String,
    sent_at: DateTime<Utc>,
    status: String,
    sender_deleted: bool,
    receiver_deleted: bool,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            body: self.body,
            sent_at: self.sent_at,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            sender_deleted: self.sender_deleted,
            receiver_deleted: self.receiver_deleted,
        })
    }
}

#[derive(FromRow)]
struct EducationRecord {
    user_id: String,
    ordinal: i32,
    institution_name: String,
    major: String,
    degree: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}
impl EducationRecord {
    fn to_domain(self) -> EducationDetail {
        EducationDetail {
            user_id: self.user_id,
            ordinal: self.ordinal,
            institution_name: self.institution_name,
            major: self.major,
            degree: self.degree,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(FromRow)]
struct WorkExperienceRecord {
    user_id: String,
    ordinal: i32,
    company: String,
    role: String,
    location: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}
impl WorkExperienceRecord {
    fn to_domain(self) -> WorkExperience {
        WorkExperience {
            user_id: self.user_id,
            ordinal: self.ordinal,
            company: self.company,
            role: self.role,
            location: self.location,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: String,
    expires_at: DateTime<Utc>,
}

const EDGE_COLUMNS: &str = "id, requester_id, target_id, status, created_at";
const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, body, sent_at, status, sender_deleted, receiver_deleted";
const EDUCATION_COLUMNS: &str =
    "user_id, ordinal, institution_name, major, degree, start_date, end_date";
const WORK_COLUMNS: &str = "user_id, ordinal, company, role, location, start_date, end_date";

fn view_predicate(view: MessageView) -> &'static str {
    match view {
        MessageView::Outgoing => "sender_id = $1 AND status <> 'draft' AND NOT sender_deleted",
        MessageView::Unread => {
            "receiver_id = $1 AND status IN ('sent', 'delivered') AND NOT receiver_deleted"
        }
        MessageView::Read => "receiver_id = $1 AND status = 'read' AND NOT receiver_deleted",
        MessageView::Drafts => "sender_id = $1 AND status = 'draft' AND NOT sender_deleted",
    }
}

/// Escapes LIKE wildcards so a search fragment matches literally.
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

//=========================================================================================
// `Store` Trait Implementation
//=========================================================================================

/// One open PostgreSQL transaction. sqlx rolls it back when dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for DbAdapter {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(port_error)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn user_exists(&mut self, user_id: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(port_error)
    }

    async fn active_edges(&mut self) -> PortResult<Vec<ConnectionEdge>> {
        let records = sqlx::query_as::<_, EdgeRecord>(&format!(
            "SELECT {} FROM connection_edges WHERE status IN ('pending', 'accepted') ORDER BY id ASC",
            EDGE_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(port_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_edge(
        &mut self,
        requester_id: &str,
        target_id: &str,
    ) -> PortResult<ConnectionEdge> {
        let record = sqlx::query_as::<_, EdgeRecord>(&format!(
            "INSERT INTO connection_edges (requester_id, target_id, status) VALUES ($1, $2, $3) RETURNING {}",
            EDGE_COLUMNS
        ))
        .bind(requester_id)
        .bind(target_id)
        .bind(ConnectionStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(port_error)?;

        record.to_domain()
    }

    async fn set_edge_status(&mut self, edge_id: i64, status: ConnectionStatus) -> PortResult<()> {
        // Waits on a concurrent writer's row lock, then re-checks the status.
        let result = sqlx::query(
            "UPDATE connection_edges SET status = $1 WHERE id = $2 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(edge_id)
        .execute(&mut *self.tx)
        .await
        .map_err(port_error)?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM connection_edges WHERE id = $1)")
                .bind(edge_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(port_error)?;
        if exists {
            Err(PortError::Conflict(format!("Edge {} is no longer pending", edge_id)))
        } else {
            Err(PortError::NotFound(format!("Edge {} not found", edge_id)))
        }
    }

    async fn pending_requests_for(&mut self, target_id: &str) -> PortResult<Vec<ConnectionEdge>> {
        let records = sqlx::query_as::<_, EdgeRecord>(&format!(
            "SELECT {} FROM connection_edges WHERE target_id = $1 AND status = 'pending' ORDER BY id ASC",
            EDGE_COLUMNS
        ))
        .bind(target_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(port_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_message(&mut self, message: NewMessage) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO messages (sender_id, receiver_id, body, sent_at, status) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.body)
        .bind(message.sent_at)
        .bind(message.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(port_error)?;

        record.to_domain()
    }

    async fn get_message(&mut self, message_id: MessageId) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM messages WHERE id = $1 FOR UPDATE",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(not_found(format!("Message {} not found", message_id)))?;

        record.to_domain()
    }

    async fn update_message(&mut self, message: &Message) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET status = $1, sent_at = $2, sender_deleted = $3, receiver_deleted = $4 WHERE id = $5",
        )
        .bind(message.status.as_str())
        .bind(message.sent_at)
        .bind(message.sender_deleted)
        .bind(message.receiver_deleted)
        .bind(message.id)
        .execute(&mut *self.tx)
        .await
        .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Message {} not found", message.id)));
        }
        Ok(())
    }

    async fn deliver_unread(&mut self, receiver_id: &str) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET status = 'delivered' \
             WHERE receiver_id = $1 AND status = 'sent' AND NOT receiver_deleted",
        )
        .bind(receiver_id)
        .execute(&mut *self.tx)
        .await
        .map_err(port_error)?;

        Ok(result.rows_affected())
    }

    async fn list_messages(&mut self, user_id: &str, view: MessageView) -> PortResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE {} ORDER BY sent_at ASC, id ASC",
            MESSAGE_COLUMNS,
            view_predicate(view)
        );
        debug!(?view, user_id, "listing messages");
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn latest_message_time(&mut self) -> PortResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>("SELECT MAX(sent_at) FROM messages")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(port_error)
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let PgStoreTransaction { tx } = *self;
        tx.commit().await.map_err(port_error)
    }
}

//=========================================================================================
// `ProfileDirectory` Trait Implementation
//=========================================================================================

impl DbAdapter {
    /// Hands out the next never-used ordinal for one of the user's detail tables.
    async fn next_ordinal(
        tx: &mut Transaction<'static, Postgres>,
        user_id: &str,
        kind: &str,
    ) -> PortResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO detail_ordinals (user_id, kind, last_ordinal) VALUES ($1, $2, 1) \
             ON CONFLICT (user_id, kind) DO UPDATE SET last_ordinal = detail_ordinals.last_ordinal + 1 \
             RETURNING last_ordinal",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_one(&mut **tx)
        .await
        .map_err(port_error)
    }
}

#[async_trait]
impl ProfileDirectory for DbAdapter {
    async fn create_user(
        &self,
        user_id: &str,
        hashed_password: &str,
        email: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, hashed_password, email) VALUES ($1, $2, $3) \
             RETURNING user_id, email, name, date_of_birth",
        )
        .bind(user_id)
        .bind(hashed_password)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, name, date_of_birth FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_credentials(&self, user_id: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn update_credential(
        &self,
        user_id: &str,
        old_hash: &str,
        new_hash: &str,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $1 WHERE user_id = $2 AND hashed_password = $3",
        )
        .bind(new_hash)
        .bind(user_id)
        .bind(old_hash)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        date_of_birth: Option<NaiveDate>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET name = $1, date_of_birth = $2 WHERE user_id = $3 \
             RETURNING user_id, email, name, date_of_birth",
        )
        .bind(name)
        .bind(date_of_birth)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn search_users(&self, fragment: &str) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, name, date_of_birth FROM users \
             WHERE user_id ILIKE $1 OR name ILIKE $1 ORDER BY user_id ASC",
        )
        .bind(like_pattern(fragment))
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_education(&self, user_id: &str) -> PortResult<Vec<EducationDetail>> {
        let records = sqlx::query_as::<_, EducationRecord>(&format!(
            "SELECT {} FROM education_details WHERE user_id = $1 ORDER BY start_date ASC, ordinal ASC",
            EDUCATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn add_education(
        &self,
        user_id: &str,
        input: EducationInput,
    ) -> PortResult<EducationDetail> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;
        let ordinal = Self::next_ordinal(&mut tx, user_id, "education").await?;
        let record = sqlx::query_as::<_, EducationRecord>(&format!(
            "INSERT INTO education_details ({}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            EDUCATION_COLUMNS, EDUCATION_COLUMNS
        ))
        .bind(user_id)
        .bind(ordinal)
        .bind(&input.institution_name)
        .bind(&input.major)
        .bind(&input.degree)
        .bind(input.start_date)
        .bind(input.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(port_error)?;
        tx.commit().await.map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn update_education(
        &self,
        user_id: &str,
        ordinal: i32,
        input: EducationInput,
    ) -> PortResult<EducationDetail> {
        let record = sqlx::query_as::<_, EducationRecord>(&format!(
            "UPDATE education_details SET institution_name = $1, major = $2, degree = $3, \
             start_date = $4, end_date = $5 WHERE user_id = $6 AND ordinal = $7 RETURNING {}",
            EDUCATION_COLUMNS
        ))
        .bind(&input.institution_name)
        .bind(&input.major)
        .bind(&input.degree)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(user_id)
        .bind(ordinal)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Education entry {} not found", ordinal)))?;
        Ok(record.to_domain())
    }

    async fn delete_education(&self, user_id: &str, ordinal: i32) -> PortResult<()> {
        let result =
            sqlx::query("DELETE FROM education_details WHERE user_id = $1 AND ordinal = $2")
                .bind(user_id)
                .bind(ordinal)
                .execute(&self.pool)
                .await
                .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Education entry {} not found",
                ordinal
            )));
        }
        Ok(())
    }

    async fn list_work_experience(&self, user_id: &str) -> PortResult<Vec<WorkExperience>> {
        let records = sqlx::query_as::<_, WorkExperienceRecord>(&format!(
            "SELECT {} FROM work_experience WHERE user_id = $1 ORDER BY start_date ASC, ordinal ASC",
            WORK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn add_work_experience(
        &self,
        user_id: &str,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;
        let ordinal = Self::next_ordinal(&mut tx, user_id, "work").await?;
        let record = sqlx::query_as::<_, WorkExperienceRecord>(&format!(
            "INSERT INTO work_experience ({}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            WORK_COLUMNS, WORK_COLUMNS
        ))
        .bind(user_id)
        .bind(ordinal)
        .bind(&input.company)
        .bind(&input.role)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(port_error)?;
        tx.commit().await.map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn update_work_experience(
        &self,
        user_id: &str,
        ordinal: i32,
        input: WorkExperienceInput,
    ) -> PortResult<WorkExperience> {
        let record = sqlx::query_as::<_, WorkExperienceRecord>(&format!(
            "UPDATE work_experience SET company = $1, role = $2, location = $3, \
             start_date = $4, end_date = $5 WHERE user_id = $6 AND ordinal = $7 RETURNING {}",
            WORK_COLUMNS
        ))
        .bind(&input.company)
        .bind(&input.role)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(user_id)
        .bind(ordinal)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Work experience entry {} not found", ordinal)))?;
        Ok(record.to_domain())
    }

    async fn delete_work_experience(&self, user_id: &str, ordinal: i32) -> PortResult<()> {
        let result =
            sqlx::query("DELETE FROM work_experience WHERE user_id = $1 AND ordinal = $2")
                .bind(user_id)
                .bind(ordinal)
                .execute(&self.pool)
                .await
                .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Work experience entry {} not found",
                ordinal
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `AuthSessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthSessionStore for DbAdapter {
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<UserId> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            self.delete_auth_session(session_id).await?;
            return Err(PortError::Unauthorized);
        }
        Ok(record.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }
}
