use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{error, info, warn};

use crate::{
    chat::dto::{ChatRequest, ChatResponse},
    completion::CompletionClient,
    conversations::{
        repo_types::Role,
        services::{append_message, resolve_conversation, touch_conversation},
    },
    error::AppError,
    state::AppState,
    storage::ChatStore,
};

pub const TECHNICAL_DIFFICULTIES_REPLY: &str = "I'm currently experiencing technical difficulties. \
     Please try again in a few moments, or contact support if the issue persists.";

/// Progress of one chat request. Only used for diagnostics; nothing is
/// persisted before [`Stage::Committed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    UserValidated,
    ConversationResolved,
    UserMessageAppended,
    AiResponseObtained,
    AssistantMessageAppended,
    Committed,
}

/// Runs a chat turn: resolve the conversation, store the question, ask the
/// completion client, store the answer, commit everything at once.
#[derive(Clone)]
pub struct ChatOrchestrator {
    store: Arc<dyn ChatStore>,
    completion: Arc<CompletionClient>,
}

impl FromRef<AppState> for ChatOrchestrator {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.completion.clone())
    }
}

impl ChatOrchestrator {
    pub fn new(store: Arc<dyn ChatStore>, completion: Arc<CompletionClient>) -> Self {
        Self { store, completion }
    }

    pub async fn handle(&self, user_id: &str, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let mut stage = Stage::Start;
        let result = self.run(user_id, request, &mut stage).await;
        match &result {
            Ok(res) => info!(%user_id, conversation_id = %res.conversation_id, "chat turn committed"),
            Err(e) => warn!(%user_id, ?stage, error = %e, "chat turn aborted, staged writes discarded"),
        }
        result
    }

    async fn run(
        &self,
        user_id: &str,
        request: ChatRequest,
        stage: &mut Stage,
    ) -> Result<ChatResponse, AppError> {
        let mut tx = self.store.begin().await?;

        if tx.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }
        *stage = Stage::UserValidated;

        let mut conversation = resolve_conversation(
            tx.as_mut(),
            user_id,
            request.conversation_id.as_deref(),
            &request.message,
        )
        .await?;
        *stage = Stage::ConversationResolved;

        append_message(tx.as_mut(), &conversation.id, Role::User, &request.message).await?;
        *stage = Stage::UserMessageAppended;

        let reply = self.obtain_reply(&request.message).await;
        *stage = Stage::AiResponseObtained;

        let answer = append_message(tx.as_mut(), &conversation.id, Role::Assistant, &reply).await?;
        touch_conversation(tx.as_mut(), &mut conversation, answer.created_at).await?;
        *stage = Stage::AssistantMessageAppended;

        tx.commit().await?;
        *stage = Stage::Committed;

        Ok(ChatResponse {
            response: reply,
            question: request.message,
            created_at: answer.created_at,
            conversation_id: conversation.id,
        })
    }

    /// The completion client already absorbs provider errors; this also
    /// contains a panic inside it.
    async fn obtain_reply(&self, message: &str) -> String {
        let completion = self.completion.clone();
        let prompt = message.to_owned();
        match tokio::spawn(async move { completion.respond(&prompt).await }).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "completion task failed");
                TECHNICAL_DIFFICULTIES_REPLY.to_string()
            }
        }
    }
}
