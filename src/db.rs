use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::repo_types::User;
use crate::config::AppConfig;
use crate::conversations::repo_types::{Conversation, ConversationSummaryRow, Message, MessageRow};
use crate::storage::{ChatStore, ChatTx, StoreError, StoreResult};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// PostgreSQL-backed [`ChatStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn ChatTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("database pool closed");
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// Maps unique-constraint violations to [`StoreError::Duplicate`].
fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or_default();
            let field = if constraint.contains("email") {
                "email"
            } else if constraint.contains("username") {
                "username"
            } else {
                "id"
            };
            return StoreError::Duplicate(field);
        }
    }
    StoreError::Database(e)
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

#[async_trait]
impl ChatTx for PgTx {
    async fn find_user(&mut self, user_id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn user_id_exists(&mut self, user_id: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)"#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn find_conversation(
        &mut self,
        conversation_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(conversation)
    }

    async fn insert_conversation(&mut self, conversation: &Conversation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, title, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn touch_conversation(
        &mut self,
        conversation_id: &str,
        at: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE conversations
               SET updated_at = GREATEST(updated_at, $2)
             WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn list_conversations(
        &mut self,
        user_id: &str,
    ) -> StoreResult<Vec<ConversationSummaryRow>> {
        let rows = sqlx::query_as::<_, ConversationSummaryRow>(
            r#"
            SELECT c.id, c.title, c.created_at, c.updated_at,
                   lm.content AS last_message
              FROM conversations c
              LEFT JOIN LATERAL (
                    SELECT m.content
                      FROM messages m
                     WHERE m.conversation_id = c.id
                     ORDER BY m.created_at DESC, m.seq DESC
                     LIMIT 1
              ) lm ON TRUE
             WHERE c.user_id = $1
             ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn delete_conversation(&mut self, conversation_id: &str) -> StoreResult<()> {
        sqlx::query(r#"DELETE FROM conversations WHERE id = $1"#)
            .bind(conversation_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_message(&mut self, message: &Message) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn list_messages(&mut self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, role, content, created_at
              FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter()
            .map(|r| Message::try_from(r).map_err(StoreError::Backend))
            .collect()
    }

    async fn delete_messages(&mut self, conversation_id: &str) -> StoreResult<u64> {
        let done = sqlx::query(r#"DELETE FROM messages WHERE conversation_id = $1"#)
            .bind(conversation_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
