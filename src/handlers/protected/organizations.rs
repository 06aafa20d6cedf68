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
use crate::services::directory::{is_valid_slug, OrganizationDetail, OrganizationSummary};
use crate::state::AppState;
use crate::workers::organizations::{CreateOrganization, OrganizationRef, UpdateOrganization};
use crate::workers::topics;

const SLUG_RULE: &str = "Slug must be 2-48 lowercase letters, digits or hyphens";

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// POST /api/organizations - Create an organization owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ValidJson(body): ValidJson<CreateOrganizationRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    errors.require("name", &body.name);
    errors.require("slug", &body.slug);
    errors.check(body.slug.is_empty() || is_valid_slug(&body.slug), "slug", SLUG_RULE);
    errors.finish()?;

    let payload = CreateOrganization {
        name: body.name.trim().to_string(),
        slug: body.slug,
    };
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::ORG_CREATE, Some(&actor), &payload)
        .await?;
    respond_with(record, StatusCode::CREATED)
}

/// GET /api/organizations - Organizations the caller belongs to
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<OrganizationSummary>> {
    Ok(ApiResponse::success(state.directory.organizations_for(actor.user_id).await))
}

/// GET /api/organizations/:org_id - Organization with its members
pub async fn show(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
) -> ApiResult<OrganizationDetail> {
    let detail = state.directory.organization_detail(actor.user_id, &org_id).await?;
    Ok(ApiResponse::success(detail))
}

/// PATCH /api/organizations/:org_id - Rename or re-slug
pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
    ValidJson(body): ValidJson<UpdateOrganizationRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    if body.name.is_none() && body.slug.is_none() {
        errors.add("name", "Provide a name or a slug to update");
    }
    if let Some(name) = &body.name {
        errors.require("name", name);
    }
    if let Some(slug) = &body.slug {
        errors.check(is_valid_slug(slug), "slug", SLUG_RULE);
    }
    errors.finish()?;

    let payload = UpdateOrganization {
        org_id,
        name: body.name.map(|n| n.trim().to_string()),
        slug: body.slug,
    };
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::ORG_UPDATE, Some(&actor), &payload)
        .await?;
    respond(record)
}

/// DELETE /api/organizations/:org_id - Owner only
pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(org_id): Path<String>,
) -> ApiResult<Value> {
    let record = state
        .bridge
        .dispatch(groups::ORG_REQUESTS, topics::ORG_DELETE, Some(&actor), &OrganizationRef { org_id })
        .await?;
    respond(record)
}
