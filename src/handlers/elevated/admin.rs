use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{parse_uuid, FieldErrors, ValidJson};
use crate::auth::{Actor, Role, UserAccount};
use crate::bridge::groups;
use crate::middleware::{respond, ApiResponse, ApiResult};
use crate::state::AppState;
use crate::workers::admin::{BanUser, SetUserRole, UserRef};
use crate::workers::{expiry_message, topics, MAX_EXPIRY_DAYS};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub reason: Option<String>,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    pub role: String,
}

/// GET /api/admin/users - Every account known to the auth engine
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserAccount>> {
    let users = state.auth.list_users().await?;
    Ok(ApiResponse::success(users))
}

/// POST /api/admin/users/:user_id/ban
pub async fn ban(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    body: Option<ValidJson<BanRequest>>,
) -> ApiResult<Value> {
    let user_id = parse_uuid("user_id", &user_id)?;
    let body = body.map(|ValidJson(b)| b).unwrap_or_default();

    let mut errors = FieldErrors::new();
    if let Some(days) = body.expires_in_days {
        errors.check((1..=MAX_EXPIRY_DAYS).contains(&days), "expiresInDays", expiry_message());
    }
    errors.finish()?;

    let payload = BanUser {
        user_id,
        reason: body.reason.filter(|r| !r.trim().is_empty()),
        expires_in_days: body.expires_in_days,
    };
    let record = state
        .bridge
        .dispatch(groups::ADMIN_REQUESTS, topics::ADMIN_BAN_USER, Some(&actor), &payload)
        .await?;
    respond(record)
}

/// POST /api/admin/users/:user_id/unban
pub async fn unban(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
) -> ApiResult<Value> {
    let user_id = parse_uuid("user_id", &user_id)?;

    let record = state
        .bridge
        .dispatch(groups::ADMIN_REQUESTS, topics::ADMIN_UNBAN_USER, Some(&actor), &UserRef { user_id })
        .await?;
    respond(record)
}

/// PUT /api/admin/users/:user_id/role
pub async fn set_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<String>,
    ValidJson(body): ValidJson<SetRoleRequest>,
) -> ApiResult<Value> {
    let user_id = parse_uuid("user_id", &user_id)?;

    let role = Role::parse(body.role.trim());
    let mut errors = FieldErrors::new();
    errors.check(role.is_some(), "role", "Role must be user or admin");
    errors.finish()?;

    let payload = SetUserRole {
        user_id,
        role: role.unwrap_or(Role::User),
    };
    let record = state
        .bridge
        .dispatch(groups::ADMIN_REQUESTS, topics::ADMIN_SET_ROLE, Some(&actor), &payload)
        .await?;
    respond(record)
}
