use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::conversations::repo_types::{Message, Role};

/// Request body for `POST /conversations`.
#[derive(Debug, Deserialize)]
pub struct NewConversationRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Message> for MessageOut {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

/// A conversation with its full message history.
#[derive(Debug, Serialize)]
pub struct ConversationOut {
    pub id: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub messages: Vec<MessageOut>,
}

/// Entry of `GET /conversations`.
#[derive(Debug, Serialize)]
pub struct ConversationListItem {
    pub id: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub last_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}
