use axum::{Json, extract::State};
use serde::Deserialize;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::extract::AppQuery;

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    /// Usually the caller, so the list can feed a recipient picker.
    pub excluding: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UsersQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let users = state.list_users(query.excluding.as_deref()).await?;
    Ok(Json(users))
}
