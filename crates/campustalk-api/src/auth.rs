use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode};

use campustalk_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiResult;
use crate::extract::AppJson;
use crate::service::MessagingService;
use crate::session::Session;

pub type AppState = Arc<MessagingService>;

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let user = state.register(&req.username, &req.password).await?;

    Ok(Json(RegisterResponse {
        username: user.username,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = state.login(&req.username, &req.password).await?;

    Ok(Json(LoginResponse {
        username: session.username().to_string(),
        token: session.token().to_string(),
        expires_at: session.expires_at(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<StatusCode> {
    state.logout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
