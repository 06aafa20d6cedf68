use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::auth::Actor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/auth/whoami - Current user as the auth engine sees it
pub async fn whoami(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Value> {
    let user = state
        .auth
        .find_user(actor.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(json!({ "user": user })))
}
