use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversations::dto::{ConversationListItem, ConversationOut, MessageOut};
use crate::conversations::repo_types::{Conversation, Message, Role};
use crate::error::AppError;
use crate::storage::{ChatStore, ChatTx};

const TITLE_MAX_CHARS: usize = 50;
const PREVIEW_MAX_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Title for a conversation started by `first_message`: at most 50 characters,
/// longer inputs keep 47 and gain an ellipsis.
pub fn derive_title(first_message: &str) -> String {
    let title = first_message.trim();
    if title.chars().count() > TITLE_MAX_CHARS {
        let keep = TITLE_MAX_CHARS - ELLIPSIS.len();
        format!("{}{}", take_chars(title, keep), ELLIPSIS)
    } else {
        title.to_string()
    }
}

/// Sidebar preview of a message body.
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_MAX_CHARS {
        format!("{}{}", take_chars(content, PREVIEW_MAX_CHARS), ELLIPSIS)
    } else {
        content.to_string()
    }
}

pub fn conversation_not_found() -> AppError {
    AppError::NotFound("Conversation not found".into())
}

/// Returns the caller's conversation `conversation_id`, or stages a new one
/// titled after `first_message` when no id is given.
pub async fn resolve_conversation(
    tx: &mut dyn ChatTx,
    user_id: &str,
    conversation_id: Option<&str>,
    first_message: &str,
) -> Result<Conversation, AppError> {
    match conversation_id.filter(|id| !id.is_empty()) {
        Some(id) => tx
            .find_conversation(id, user_id)
            .await?
            .ok_or_else(conversation_not_found),
        None => {
            let now = OffsetDateTime::now_utc();
            let conversation = Conversation {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                title: derive_title(first_message),
                created_at: now,
                updated_at: now,
            };
            tx.insert_conversation(&conversation).await?;
            debug!(conversation_id = %conversation.id, %user_id, "conversation staged");
            Ok(conversation)
        }
    }
}

/// Stages one message; the caller owns the commit.
pub async fn append_message(
    tx: &mut dyn ChatTx,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> Result<Message, AppError> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        role,
        content: content.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    tx.insert_message(&message).await?;
    Ok(message)
}

/// Records activity on `conversation` at `at`.
pub async fn touch_conversation(
    tx: &mut dyn ChatTx,
    conversation: &mut Conversation,
    at: OffsetDateTime,
) -> Result<(), AppError> {
    tx.touch_conversation(&conversation.id, at).await?;
    conversation.updated_at = conversation.updated_at.max(at);
    Ok(())
}

pub async fn list_conversations(
    store: &dyn ChatStore,
    user_id: &str,
) -> Result<Vec<ConversationListItem>, AppError> {
    let mut tx = store.begin().await?;
    let rows = tx.list_conversations(user_id).await?;
    Ok(rows
        .into_iter()
        .map(|r| ConversationListItem {
            id: r.id,
            title: r.title,
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_message: r.last_message.as_deref().map(preview),
        })
        .collect())
}

pub async fn get_conversation(
    store: &dyn ChatStore,
    user_id: &str,
    conversation_id: &str,
) -> Result<ConversationOut, AppError> {
    let mut tx = store.begin().await?;
    let conversation = tx
        .find_conversation(conversation_id, user_id)
        .await?
        .ok_or_else(conversation_not_found)?;
    let messages = tx.list_messages(&conversation.id).await?;
    Ok(ConversationOut {
        id: conversation.id,
        title: conversation.title,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        messages: messages.into_iter().map(MessageOut::from).collect(),
    })
}

pub async fn create_conversation(
    store: &dyn ChatStore,
    user_id: &str,
    title: &str,
) -> Result<ConversationOut, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".into()));
    }

    let mut tx = store.begin().await?;
    if tx.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let now = OffsetDateTime::now_utc();
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: derive_title(title),
        created_at: now,
        updated_at: now,
    };
    tx.insert_conversation(&conversation).await?;
    tx.commit().await?;

    info!(conversation_id = %conversation.id, %user_id, "conversation created");
    Ok(ConversationOut {
        id: conversation.id,
        title: conversation.title,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        messages: Vec::new(),
    })
}

/// Removes a conversation and all of its messages in one transaction.
pub async fn delete_conversation(
    store: &dyn ChatStore,
    user_id: &str,
    conversation_id: &str,
) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    let conversation = tx
        .find_conversation(conversation_id, user_id)
        .await?
        .ok_or_else(conversation_not_found)?;

    let removed = tx.delete_messages(&conversation.id).await?;
    tx.delete_conversation(&conversation.id).await?;
    tx.commit().await?;

    info!(conversation_id = %conversation.id, %user_id, removed, "conversation deleted");
    Ok(())
}
