// handlers/mod.rs - Three handler tiers
//
// Public (no auth) -> Protected (session auth) -> Elevated (admin role)

pub mod elevated;
pub mod protected;
pub mod public;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Organization Admin API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-tenant organization, membership and admin API over a correlated request bridge",
        "endpoints": {
            "public_auth": "/auth/register, /auth/login (public)",
            "auth": "/api/auth/whoami (protected)",
            "organizations": "/api/organizations[/:org_id] (protected)",
            "members": "/api/organizations/:org_id/members[/:user_id] (protected)",
            "invitations": "/api/organizations/:org_id/invitations, /api/invitations/:invitation_id/accept (protected)",
            "api_keys": "/api/api-keys[/:key_id] (protected)",
            "rag": "/api/rag/query, /api/rag/ingest[/:request_id] (protected)",
            "admin": "/api/admin/users[/:user_id/{ban,unban,role}] (admin)",
        }
    }))
}

/// GET /health - Liveness plus a correlation store check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let store = state.bridge.store();

    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": store.backend(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "store": store.backend(),
                "error": e.to_string(),
            })),
        ),
    }
}
