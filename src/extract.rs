//! `AppJson<T>` replaces `axum::Json<T>` in handler arguments so that a bad
//! request body is answered with the usual `{detail}` JSON instead of axum's
//! plain-text rejection.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use crate::error::AppError;

pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Well-formed JSON of the wrong shape is a 422; anything else about the body
/// (syntax, content type, read failure) is a 400.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let detail = format!("Invalid request body: {}", rejection.body_text());
    match rejection {
        JsonRejection::JsonDataError(_) => AppError::Unprocessable(detail),
        _ => AppError::BadRequest(detail),
    }
}
