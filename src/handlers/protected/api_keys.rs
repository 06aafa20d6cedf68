use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{FieldErrors, ValidJson};
use crate::auth::Actor;
use crate::bridge::groups;
use crate::middleware::{respond, respond_with, ApiResponse, ApiResult};
use crate::services::directory::ApiKey;
use crate::state::AppState;
use crate::workers::api_keys::{CreateApiKey, RevokeApiKey};
use crate::workers::{expiry_message, topics, MAX_EXPIRY_DAYS};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    #[serde(default)]
    pub name: String,
    pub expires_in_days: Option<i64>,
}

/// POST /api/api-keys - The secret appears in this response only
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ValidJson(body): ValidJson<CreateApiKeyRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    errors.require("name", &body.name);
    if let Some(days) = body.expires_in_days {
        errors.check((1..=MAX_EXPIRY_DAYS).contains(&days), "expiresInDays", expiry_message());
    }
    errors.finish()?;

    let payload = CreateApiKey {
        name: body.name.trim().to_string(),
        expires_in_days: body.expires_in_days,
    };
    let record = state
        .bridge
        .dispatch(groups::APIKEY_REQUESTS, topics::APIKEY_CREATE, Some(&actor), &payload)
        .await?;
    respond_with(record, StatusCode::CREATED)
}

/// GET /api/api-keys
pub async fn list(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<ApiKey>> {
    Ok(ApiResponse::success(state.directory.api_keys_for(actor.user_id).await))
}

/// DELETE /api/api-keys/:key_id
pub async fn revoke(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(key_id): Path<String>,
) -> ApiResult<Value> {
    let record = state
        .bridge
        .dispatch(groups::APIKEY_REQUESTS, topics::APIKEY_REVOKE, Some(&actor), &RevokeApiKey { key_id })
        .await?;
    respond(record)
}
