use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    conversations::{
        dto::{ConversationListItem, ConversationOut, DeletedResponse, NewConversationRequest},
        services,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
}

#[instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ConversationListItem>>, AppError> {
    let items = services::list_conversations(state.store.as_ref(), &user_id).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationOut>, AppError> {
    let conversation = services::get_conversation(state.store.as_ref(), &user_id, &id).await?;
    Ok(Json(conversation))
}

#[instrument(skip(state, payload))]
pub async fn create_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<NewConversationRequest>,
) -> Result<Json<ConversationOut>, AppError> {
    let conversation =
        services::create_conversation(state.store.as_ref(), &user_id, &payload.title).await?;
    Ok(Json(conversation))
}

#[instrument(skip(state))]
pub async fn delete_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    services::delete_conversation(state.store.as_ref(), &user_id, &id).await?;
    Ok(Json(DeletedResponse {
        message: "Conversation deleted successfully".into(),
    }))
}
