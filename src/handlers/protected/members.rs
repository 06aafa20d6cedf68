use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::{parse_uuid, FieldErrors, ValidJson};
use crate::auth::Actor;
use crate::bridge::groups;
use crate::middleware::{respond, respond_with, ApiResult};
use crate::services::directory::MemberRole;
use crate::state::AppState;
use crate::workers::members::{MemberChange, MemberRef};
use crate::workers::topics;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Option<String>,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: Option<MemberRole>,
}

fn assignable(role: Option<MemberRole>, errors: &mut FieldErrors) -> MemberRole {
    let role = role.unwrap_or(MemberRole::Member);
    errors.check(role != MemberRole::Owner, "role", "Role must be admin or member");
    role
}

/// POST /api/organizations/:org_id/members - Add an existing user
pub async fn add(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
    ValidJson(body): ValidJson<AddMemberRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    let user_id = body.user_id.as_deref().and_then(|id| Uuid::parse_str(id).ok());
    errors.check(user_id.is_some(), "userId", "userId must be a valid UUID");
    let role = assignable(body.role, &mut errors);
    errors.finish()?;

    let payload = MemberChange {
        org_id,
        user_id: user_id.unwrap_or_default(),
        role,
    };
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::MEMBER_ADD, Some(&actor), &payload)
        .await?;
    respond_with(record, StatusCode::CREATED)
}

/// PATCH /api/organizations/:org_id/members/:user_id - Change a member's role
pub async fn update_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((org_id, user_id)): Path<(String, String)>,
    ValidJson(body): ValidJson<UpdateMemberRequest>,
) -> ApiResult<Value> {
    let user_id = parse_uuid("user_id", &user_id)?;

    let mut errors = FieldErrors::new();
    errors.check(body.role.is_some(), "role", "role is required");
    let role = assignable(body.role, &mut errors);
    errors.finish()?;

    let payload = MemberChange { org_id, user_id, role };
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::MEMBER_UPDATE_ROLE, Some(&actor), &payload)
        .await?;
    respond(record)
}

/// DELETE /api/organizations/:org_id/members/:user_id - Remove a member, or leave
pub async fn remove(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((org_id, user_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let user_id = parse_uuid("user_id", &user_id)?;

    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::MEMBER_REMOVE, Some(&actor), &MemberRef { org_id, user_id })
        .await?;
    respond(record)
}
