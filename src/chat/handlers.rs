use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    chat::{
        dto::{ChatRequest, ChatResponse},
        services::ChatOrchestrator,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn chat_routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[instrument(skip(chat, payload))]
pub async fn chat(
    State(chat): State<ChatOrchestrator>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = chat.handle(&user_id, payload).await?;
    Ok(Json(response))
}
