use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use campustalk_types::api::{MessageResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::{AppJson, AppQuery};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// The other participant of the thread.
    pub with: String,
    /// Cursor for polling: only messages after this one are returned.
    pub after: Option<Uuid>,
    pub limit: Option<u32>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state.send(&session, &req.receiver, &req.body).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    AppQuery(query): AppQuery<MessageQuery>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .fetch_thread(&session, &query.with, query.after, query.limit)
        .await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}
