//! crates/prof_network_core/src/messages.rs
//!
//! Message lifecycle: compose (draft or sent), send draft, delivery on the
//! receiver's unread listing, read, and independent per-party soft deletion.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::info;

use crate::domain::{Message, MessageId, MessageStatus, NewMessage};
use crate::error::{NetworkError, NetworkResult};
use crate::ports::{MessageView, Store, StoreTransaction};

#[derive(Clone)]
pub struct MessageStore {
    store: Arc<dyn Store>,
}

impl MessageStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn compose(
        &self,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
        save_as_draft: bool,
    ) -> NetworkResult<Message> {
        let mut tx = self.store.begin().await?;
        if !tx.user_exists(receiver_id).await? {
            return Err(NetworkError::InvalidReceiver(receiver_id.to_owned()));
        }
        if body.trim().is_empty() {
            return Err(NetworkError::EmptyBody);
        }

        let status = if save_as_draft {
            MessageStatus::Draft
        } else {
            MessageStatus::Sent
        };
        let sent_at = next_timestamp(tx.as_mut()).await?;
        let message = tx
            .insert_message(NewMessage {
                sender_id: sender_id.to_owned(),
                receiver_id: receiver_id.to_owned(),
                body: body.to_owned(),
                sent_at,
                status,
            })
            .await?;
        tx.commit().await?;

        info!(message_id = message.id, sender_id, receiver_id, %status, "message composed");
        Ok(message)
    }

    /// Sends one of the sender's drafts; the message is restamped so it lists
    /// after everything already sent.
    pub async fn send_draft(&self, sender_id: &str, message_id: MessageId) -> NetworkResult<Message> {
        let mut tx = self.store.begin().await?;
        let mut message = tx.get_message(message_id).await?;
        if message.sender_id != sender_id {
            return Err(forbidden(message_id));
        }
        if message.status != MessageStatus::Draft || message.sender_deleted {
            return Err(NetworkError::NotFound(format!("Draft {} not found", message_id)));
        }

        message.status = MessageStatus::Sent;
        message.sent_at = next_timestamp(tx.as_mut()).await?;
        tx.update_message(&message).await?;
        tx.commit().await?;

        info!(message_id, sender_id, "draft sent");
        Ok(message)
    }

    /// Marks a received message as read. Reading twice is not an error.
    pub async fn mark_read(&self, receiver_id: &str, message_id: MessageId) -> NetworkResult<Message> {
        let mut tx = self.store.begin().await?;
        let message = tx.get_message(message_id).await?;
        if message.receiver_id != receiver_id {
            return Err(forbidden(message_id));
        }
        if !message.visible_to_receiver() {
            return Err(NetworkError::NotFound(format!("Message {} not found", message_id)));
        }
        finish_read(tx, message).await
    }

    /// Shows a message to one of its parties. The receiver opening it reads it.
    pub async fn open(&self, user_id: &str, message_id: MessageId) -> NetworkResult<Message> {
        let mut tx = self.store.begin().await?;
        let message = tx.get_message(message_id).await?;
        if message.receiver_id == user_id && message.visible_to_receiver() {
            return finish_read(tx, message).await;
        }
        if message.sender_id == user_id && message.visible_to_sender() {
            return Ok(message);
        }
        if message.sender_id == user_id || message.receiver_id == user_id {
            return Err(NetworkError::NotFound(format!("Message {} not found", message_id)));
        }
        Err(forbidden(message_id))
    }

    pub async fn delete_as_sender(&self, sender_id: &str, message_id: MessageId) -> NetworkResult<()> {
        let mut tx = self.store.begin().await?;
        let mut message = tx.get_message(message_id).await?;
        if message.sender_id != sender_id {
            return Err(forbidden(message_id));
        }
        if message.sender_deleted {
            return Ok(());
        }

        message.sender_deleted = true;
        tx.update_message(&message).await?;
        tx.commit().await?;
        info!(message_id, sender_id, "message deleted by sender");
        Ok(())
    }

    pub async fn delete_as_receiver(
        &self,
        receiver_id: &str,
        message_id: MessageId,
    ) -> NetworkResult<()> {
        let mut tx = self.store.begin().await?;
        let mut message = tx.get_message(message_id).await?;
        if message.receiver_id != receiver_id {
            return Err(forbidden(message_id));
        }
        if message.status == MessageStatus::Draft {
            return Err(NetworkError::NotFound(format!("Message {} not found", message_id)));
        }
        if message.receiver_deleted {
            return Ok(());
        }

        message.receiver_deleted = true;
        tx.update_message(&message).await?;
        tx.commit().await?;
        info!(message_id, receiver_id, "message deleted by receiver");
        Ok(())
    }

    pub async fn list_outgoing(&self, user_id: &str) -> NetworkResult<Vec<Message>> {
        self.list(user_id, MessageView::Outgoing).await
    }

    /// Unread messages for `user_id`. Listing them delivers any still marked Sent.
    pub async fn list_unread(&self, user_id: &str) -> NetworkResult<Vec<Message>> {
        let mut tx = self.store.begin().await?;
        let delivered = tx.deliver_unread(user_id).await?;
        let messages = tx.list_messages(user_id, MessageView::Unread).await?;
        tx.commit().await?;

        if delivered > 0 {
            info!(user_id, delivered, "messages delivered");
        }
        Ok(messages)
    }

    pub async fn list_read(&self, user_id: &str) -> NetworkResult<Vec<Message>> {
        self.list(user_id, MessageView::Read).await
    }

    pub async fn list_drafts(&self, user_id: &str) -> NetworkResult<Vec<Message>> {
        self.list(user_id, MessageView::Drafts).await
    }

    /// Retrieves a stored message whatever its deletion flags.
    pub async fn get(&self, message_id: MessageId) -> NetworkResult<Message> {
        let mut tx = self.store.begin().await?;
        Ok(tx.get_message(message_id).await?)
    }

    async fn list(&self, user_id: &str, view: MessageView) -> NetworkResult<Vec<Message>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_messages(user_id, view).await?)
    }
}

async fn finish_read(
    mut tx: Box<dyn StoreTransaction>,
    mut message: Message,
) -> NetworkResult<Message> {
    if message.status != MessageStatus::Read {
        message.status = MessageStatus::Read;
        tx.update_message(&message).await?;
        tx.commit().await?;
    }
    Ok(message)
}

fn forbidden(message_id: MessageId) -> NetworkError {
    NetworkError::Forbidden(format!("message {} belongs to other users", message_id))
}

/// Now, at the store's microsecond precision, and strictly after every
/// timestamp already in the message table.
async fn next_timestamp(tx: &mut dyn StoreTransaction) -> NetworkResult<DateTime<Utc>> {
    let now = Utc::now();
    let now = now
        .with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now);
    Ok(match tx.latest_message_time().await? {
        Some(latest) if latest >= now => latest + Duration::microseconds(1),
        _ => now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ports::ProfileDirectory;

    fn ids(messages: &[Message]) -> Vec<MessageId> {
        messages.iter().map(|message| message.id).collect()
    }

    async fn setup() -> MessageStore {
        let store = Arc::new(MemoryStore::new());
        for user in ["u1", "u2", "u3"] {
            store
                .create_user(user, "hash", &format!("{user}@example.com"))
                .await
                .unwrap();
        }
        MessageStore::new(store)
    }

    #[tokio::test]
    async fn compose_validates_receiver_and_body() {
        let messages = setup().await;

        assert!(matches!(
            messages.compose("u1", "ghost", "hi", false).await,
            Err(NetworkError::InvalidReceiver(_))
        ));
        assert!(matches!(
            messages.compose("u1", "u2", "", false).await,
            Err(NetworkError::EmptyBody)
        ));
        assert!(matches!(
            messages.compose("u1", "u2", "   ", true).await,
            Err(NetworkError::EmptyBody)
        ));
        assert!(messages.list_outgoing("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sent_draft_lists_after_earlier_sent_messages() {
        let messages = setup().await;
        let draft = messages.compose("u1", "u2", "hi", true).await.unwrap();
        assert_eq!(draft.status, MessageStatus::Draft);

        let first = messages.compose("u1", "u2", "first", false).await.unwrap();
        let second = messages.compose("u1", "u3", "second", false).await.unwrap();
        assert_eq!(ids(&messages.list_outgoing("u1").await.unwrap()), vec![first.id, second.id]);
        assert_eq!(ids(&messages.list_drafts("u1").await.unwrap()), vec![draft.id]);

        let sent = messages.send_draft("u1", draft.id).await.unwrap();

        assert_eq!(sent.status, MessageStatus::Sent);
        assert_eq!(
            ids(&messages.list_outgoing("u1").await.unwrap()),
            vec![first.id, second.id, draft.id]
        );
        assert!(messages.list_drafts("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drafts_are_invisible_to_the_receiver() {
        let messages = setup().await;
        let draft = messages.compose("u1", "u2", "later", true).await.unwrap();

        assert!(messages.list_unread("u2").await.unwrap().is_empty());
        assert!(matches!(
            messages.mark_read("u2", draft.id).await,
            Err(NetworkError::NotFound(_))
        ));
        assert!(matches!(
            messages.delete_as_receiver("u2", draft.id).await,
            Err(NetworkError::NotFound(_))
        ));
        assert!(matches!(
            messages.send_draft("u2", draft.id).await,
            Err(NetworkError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn only_drafts_can_be_sent() {
        let messages = setup().await;
        let sent = messages.compose("u1", "u2", "hello", false).await.unwrap();

        assert!(matches!(
            messages.send_draft("u1", sent.id).await,
            Err(NetworkError::NotFound(_))
        ));
        assert!(matches!(
            messages.send_draft("u1", 999).await,
            Err(NetworkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deletions_are_independent_per_party() {
        let messages = setup().await;
        let m = messages.compose("u1", "u2", "hi", false).await.unwrap();

        messages.delete_as_sender("u1", m.id).await.unwrap();
        assert!(messages.list_outgoing("u1").await.unwrap().is_empty());
        assert_eq!(ids(&messages.list_unread("u2").await.unwrap()), vec![m.id]);

        messages.delete_as_receiver("u2", m.id).await.unwrap();
        for user in ["u1", "u2"] {
            assert!(messages.list_outgoing(user).await.unwrap().is_empty());
            assert!(messages.list_unread(user).await.unwrap().is_empty());
            assert!(messages.list_read(user).await.unwrap().is_empty());
            assert!(messages.list_drafts(user).await.unwrap().is_empty());
        }

        let retained = messages.get(m.id).await.unwrap();
        assert!(retained.sender_deleted && retained.receiver_deleted);
        assert_eq!(retained.body, "hi");
    }

    #[tokio::test]
    async fn deletes_are_idempotent_and_owner_only() {
        let messages = setup().await;
        let m = messages.compose("u1", "u2", "hi", false).await.unwrap();

        messages.delete_as_sender("u1", m.id).await.unwrap();
        messages.delete_as_sender("u1", m.id).await.unwrap();
        assert!(matches!(
            messages.delete_as_sender("u2", m.id).await,
            Err(NetworkError::Forbidden(_))
        ));
        assert!(matches!(
            messages.delete_as_receiver("u3", m.id).await,
            Err(NetworkError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn deleted_draft_disappears_from_drafts() {
        let messages = setup().await;
        let draft = messages.compose("u1", "u2", "draft", true).await.unwrap();

        messages.delete_as_sender("u1", draft.id).await.unwrap();

        assert!(messages.list_drafts("u1").await.unwrap().is_empty());
        assert!(matches!(
            messages.send_draft("u1", draft.id).await,
            Err(NetworkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unread_listing_delivers_and_reading_is_idempotent() {
        let messages = setup().await;
        let m = messages.compose("u1", "u2", "ping", false).await.unwrap();

        let unread = messages.list_unread("u2").await.unwrap();
        assert_eq!(unread[0].status, MessageStatus::Delivered);
        assert_eq!(messages.get(m.id).await.unwrap().status, MessageStatus::Delivered);

        assert!(matches!(
            messages.mark_read("u3", m.id).await,
            Err(NetworkError::Forbidden(_))
        ));
        let first = messages.mark_read("u2", m.id).await.unwrap();
        let second = messages.mark_read("u2", m.id).await.unwrap();
        assert_eq!(first.status, MessageStatus::Read);
        assert_eq!(second.status, MessageStatus::Read);

        assert!(messages.list_unread("u2").await.unwrap().is_empty());
        assert_eq!(ids(&messages.list_read("u2").await.unwrap()), vec![m.id]);
        // the sender still sees it as outgoing
        assert_eq!(ids(&messages.list_outgoing("u1").await.unwrap()), vec![m.id]);
    }

    #[tokio::test]
    async fn opening_reads_for_the_receiver_only() {
        let messages = setup().await;
        let m = messages.compose("u1", "u2", "open me", false).await.unwrap();

        let as_sender = messages.open("u1", m.id).await.unwrap();
        assert_eq!(as_sender.status, MessageStatus::Sent);

        let as_receiver = messages.open("u2", m.id).await.unwrap();
        assert_eq!(as_receiver.status, MessageStatus::Read);

        assert!(matches!(messages.open("u3", m.id).await, Err(NetworkError::Forbidden(_))));
    }

    #[tokio::test]
    async fn identifiers_strictly_increase_across_deletions() {
        let messages = setup().await;
        let mut seen = Vec::new();
        for round in 0..12 {
            let draft = round % 3 == 0;
            let m = messages
                .compose("u1", "u2", &format!("message {round}"), draft)
                .await
                .unwrap();
            if round % 2 == 0 {
                messages.delete_as_sender("u1", m.id).await.unwrap();
            }
            seen.push(m.id);
        }

        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn listings_are_ordered_by_time_then_id() {
        let messages = setup().await;
        let a = messages.compose("u1", "u2", "a", false).await.unwrap();
        let b = messages.compose("u3", "u2", "b", false).await.unwrap();
        let c = messages.compose("u1", "u2", "c", false).await.unwrap();

        let unread = messages.list_unread("u2").await.unwrap();
        assert_eq!(ids(&unread), vec![a.id, b.id, c.id]);
        assert!(unread.windows(2).all(|pair| pair[0].sent_at < pair[1].sent_at));
        let senders: Vec<&str> = unread.iter().map(|m| m.sender_id.as_str()).collect();
        assert_eq!(senders, vec!["u1", "u3", "u1"]);
    }
}
