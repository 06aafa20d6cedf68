use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{Actor, AuthError, Role};
use crate::error::ApiError;
use crate::services::directory::API_KEY_PREFIX;
use crate::state::AppState;

/// Session authentication: verifies the bearer token (a session JWT or an
/// issued API key), rejects banned users and injects the `Actor` into request extensions
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let actor = if token.starts_with(API_KEY_PREFIX) {
        actor_for_api_key(&state, &token).await?
    } else {
        state.auth.verify_session(&token).await?
    };

    match state.auth.check_ban(actor.user_id).await {
        Ok(None) => {}
        Ok(Some(ban)) => {
            tracing::info!("Rejected request from banned user {}", actor.user_id);
            return Err(ApiError::forbidden(format!("User is banned: {}", ban.describe())));
        }
        // Token outlived its account
        Err(AuthError::UserNotFound) => return Err(ApiError::unauthorized("Unknown user")),
        Err(e) => return Err(e.into()),
    }

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Resolve a live API key to its owner
async fn actor_for_api_key(state: &AppState, secret: &str) -> Result<Actor, ApiError> {
    let key = state
        .directory
        .verify_api_key(secret)
        .await
        .ok_or_else(|| ApiError::unauthorized("Invalid or revoked API key"))?;

    let user = state
        .auth
        .find_user(key.owner_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;
    tracing::debug!("Authenticated {} with API key {}", user.id, key.prefix);
    Ok(user.actor())
}

/// Admin gate for elevated routes; runs after `jwt_auth_middleware`
pub async fn require_admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let actor = request
        .extensions()
        .get::<Actor>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !state.auth.check_role(actor.user_id, Role::Admin).await? {
        tracing::warn!("Non-admin {} attempted an admin operation", actor.user_id);
        return Err(ApiError::forbidden("Admin role required"));
    }

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
