use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo_types::User;
use crate::conversations::repo_types::{Conversation, ConversationSummaryRow, Message};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Source of request-scoped transactions.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn ChatTx>>;

    /// Releases pooled connections at shutdown.
    async fn close(&self) {}
}

/// One unit of work. Writes are staged until [`ChatTx::commit`]; dropping the
/// transaction without committing discards them.
#[async_trait]
pub trait ChatTx: Send {
    async fn find_user(&mut self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn user_id_exists(&mut self, user_id: &str) -> StoreResult<bool>;
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;

    async fn find_conversation(
        &mut self,
        conversation_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Conversation>>;
    async fn insert_conversation(&mut self, conversation: &Conversation) -> StoreResult<()>;
    /// Moves `updated_at` forward to `at`; never moves it backwards.
    async fn touch_conversation(
        &mut self,
        conversation_id: &str,
        at: OffsetDateTime,
    ) -> StoreResult<()>;
    /// Conversations of a user, most recently updated first.
    async fn list_conversations(&mut self, user_id: &str)
        -> StoreResult<Vec<ConversationSummaryRow>>;
    async fn delete_conversation(&mut self, conversation_id: &str) -> StoreResult<()>;

    async fn insert_message(&mut self, message: &Message) -> StoreResult<()>;
    /// Messages in persisted creation order.
    async fn list_messages(&mut self, conversation_id: &str) -> StoreResult<Vec<Message>>;
    /// Returns the number of removed rows.
    async fn delete_messages(&mut self, conversation_id: &str) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
