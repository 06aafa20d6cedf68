use axum::{
    extract::{Path, State},
    Extension,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::{FieldErrors, ValidJson};
use crate::auth::Actor;
use crate::bridge::{groups, BridgeError, CorrelationId};
use crate::error::ApiError;
use crate::middleware::{respond, ApiResponse, ApiResult};
use crate::rag::MAX_QUERY_LIMIT;
use crate::state::AppState;
use crate::workers::rag::{IngestRequested, QueryRequested};
use crate::workers::topics;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub folder: String,
}

/// Stored next to each ingest so only its submitter can read its status
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestOwner {
    user_id: Uuid,
}

/// POST /api/rag/query - Answer a question from the indexed documents
pub async fn query(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ValidJson(body): ValidJson<QueryRequest>,
) -> ApiResult<Value> {
    let limit = body.limit.unwrap_or(state.config.rag.default_limit as i64);

    let mut errors = FieldErrors::new();
    errors.require("query", &body.query);
    errors.check(
        (1..=MAX_QUERY_LIMIT as i64).contains(&limit),
        "limit",
        format!("limit must be between 1 and {}", MAX_QUERY_LIMIT),
    );
    errors.finish()?;

    let payload = QueryRequested {
        query: body.query.trim().to_string(),
        limit: limit as usize,
    };
    let budget = state.bridge.options().long_timeout;
    let record = state
        .bridge
        .dispatch_with(groups::RAG_WORKFLOW, topics::RAG_QUERY, Some(&actor), &payload, budget)
        .await?;
    respond(record)
}

/// POST /api/rag/ingest - Start indexing a folder; poll the returned id
pub async fn ingest(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ValidJson(body): ValidJson<IngestRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    errors.require("folder", &body.folder);
    errors.finish()?;

    let payload = IngestRequested {
        folder: body.folder.trim().to_string(),
    };
    let id = state
        .bridge
        .submit(groups::RAG_WORKFLOW, topics::RAG_INGEST, Some(&actor), &payload)
        .await?;

    let owner = serde_json::to_value(IngestOwner { user_id: actor.user_id })
        .map_err(|e| ApiError::internal_server_error(format!("Failed to encode owner: {}", e)))?;
    state
        .bridge
        .store()
        .set(groups::RAG_INGEST_OWNERS, id.as_str(), owner)
        .await
        .map_err(BridgeError::from)?;

    tracing::info!("Ingest of {} accepted as {}", payload.folder, id);
    Ok(ApiResponse::accepted(json!({
        "requestId": id.as_str(),
        "status": "pending",
    })))
}

/// GET /api/rag/ingest/:request_id - Current state of the caller's own ingest request
pub async fn status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
) -> ApiResult<Value> {
    let id = CorrelationId::from(request_id);

    // Query exchanges and other users' ingests look the same as unknown ids
    let owner = state
        .bridge
        .store()
        .get(groups::RAG_INGEST_OWNERS, id.as_str())
        .await
        .map_err(BridgeError::from)?
        .and_then(|value| serde_json::from_value::<IngestOwner>(value).ok());
    if !matches!(owner, Some(ref o) if o.user_id == actor.user_id) {
        return Err(ApiError::not_found("Ingest request not found"));
    }

    let record = state
        .bridge
        .status::<Value>(groups::RAG_WORKFLOW, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingest request not found"))?;

    let body = serde_json::to_value(&record)
        .map_err(|e| ApiError::internal_server_error(format!("Failed to encode record: {}", e)))?;
    Ok(ApiResponse::success(body))
}
