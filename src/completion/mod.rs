use std::sync::Arc;

use tracing::{error, warn};

pub mod mock;
pub mod provider;

use provider::{CompletionProvider, FailureKind};

pub const EMPTY_COMPLETION_REPLY: &str =
    "I'm sorry, I couldn't generate a proper response. Please try rephrasing your question.";
pub const BAD_REQUEST_REPLY: &str =
    "I couldn't understand your request properly. Please try rephrasing your question.";
pub const UNAVAILABLE_REPLY: &str =
    "My AI service is temporarily unavailable. Please try again in a few minutes.";
pub const TIMEOUT_REPLY: &str =
    "The response took too long to generate. Please try with a shorter or simpler question.";

/// Turns a user message into assistant text. Never fails: provider errors are
/// classified and replaced with a fixed or mocked reply.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn respond(&self, user_message: &str) -> String {
        match self.provider.complete(user_message).await {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => {
                warn!("completion provider returned no content");
                EMPTY_COMPLETION_REPLY.to_string()
            }
            Err(e) => {
                let kind = e.kind();
                error!(error = %e, ?kind, "completion provider error");
                fallback_reply(kind, user_message)
            }
        }
    }
}

pub fn fallback_reply(kind: FailureKind, user_message: &str) -> String {
    match kind {
        FailureKind::RateLimited | FailureKind::Unknown => mock::mock_response(user_message),
        FailureKind::BadRequest => BAD_REQUEST_REPLY.to_string(),
        FailureKind::Unavailable => UNAVAILABLE_REPLY.to_string(),
        FailureKind::Timeout => TIMEOUT_REPLY.to_string(),
    }
}
