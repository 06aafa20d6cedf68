use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{is_valid_email, FieldErrors, ValidJson};
use crate::auth::Actor;
use crate::bridge::groups;
use crate::error::ApiError;
use crate::middleware::{respond, respond_with, ApiResponse, ApiResult};
use crate::services::directory::{Invitation, MemberRole};
use crate::state::AppState;
use crate::workers::invitations::{AcceptInvitation, CancelInvitation, CreateInvitation};
use crate::workers::topics;

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    #[serde(default)]
    pub email: String,
    pub role: Option<MemberRole>,
}

/// POST /api/organizations/:org_id/invitations - Invite an email address
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
    ValidJson(body): ValidJson<CreateInvitationRequest>,
) -> ApiResult<Value> {
    let role = body.role.unwrap_or(MemberRole::Member);

    let mut errors = FieldErrors::new();
    errors.check(is_valid_email(&body.email), "email", "A valid email address is required");
    errors.check(role != MemberRole::Owner, "role", "Role must be admin or member");
    errors.finish()?;

    let payload = CreateInvitation {
        org_id,
        email: body.email.trim().to_string(),
        role,
    };
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::INVITATION_CREATE, Some(&actor), &payload)
        .await?;
    respond_with(record, StatusCode::CREATED)
}

/// GET /api/organizations/:org_id/invitations - Owners and admins only
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
) -> ApiResult<Vec<Invitation>> {
    let detail = state.directory.organization_detail(actor.user_id, &org_id).await?;
    let manages = detail
        .members
        .iter()
        .any(|m| m.user_id == actor.user_id && m.role.can_manage());
    if !manages {
        return Err(ApiError::forbidden("Only owners and admins can view invitations"));
    }

    Ok(ApiResponse::success(state.directory.invitations_for(&org_id).await))
}

/// POST /api/invitations/:invitation_id/accept - Join as the invited user
pub async fn accept(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(invitation_id): Path<String>,
) -> ApiResult<Value> {
    let record = state
        .bridge
        .dispatch(
            groups::ORG_REQUESTS,
            topics::INVITATION_ACCEPT,
            Some(&actor),
            &AcceptInvitation { invitation_id },
        )
        .await?;
    respond(record)
}

/// DELETE /api/organizations/:org_id/invitations/:invitation_id
pub async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((org_id, invitation_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let record = state
        .bridge
        .dispatch(
            groups::ORG_REQUESTS,
            topics::INVITATION_CANCEL,
            Some(&actor),
            &CancelInvitation { org_id, invitation_id },
        )
        .await?;
    respond(record)
}
