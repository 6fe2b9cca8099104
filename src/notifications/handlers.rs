use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::notifications::repo::Notification;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/notifications", get(list_mine))
}

/// Newest first. Disabled accounts are turned away by `CurrentUser`.
#[instrument(skip(state, me), fields(user_id = %me.0.id))]
pub async fn list_mine(
    State(state): State<AppState>,
    me: CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let items = state.notifier.store().list_for_user(me.0.id, limit).await?;
    Ok(Json(items))
}
