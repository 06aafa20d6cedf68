use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{is_valid_email, FieldErrors, ValidJson};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/register - Create an account
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    errors.check(is_valid_email(&body.email), "email", "A valid email address is required");
    errors.require("name", &body.name);
    errors.check(
        body.password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
    );
    errors.finish()?;

    let user = state.auth.register(&body.email, &body.name, &body.password).await?;
    tracing::info!("Registered user {}", user.id);

    Ok(ApiResponse::created(json!({ "user": user })))
}

/// POST /auth/login - Exchange credentials for a session token
pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Value> {
    let mut errors = FieldErrors::new();
    errors.require("email", &body.email);
    errors.require("password", &body.password);
    errors.finish()?;

    let user = state.auth.validate_credentials(&body.email, &body.password).await?;
    if let Some(ban) = state.auth.check_ban(user.id).await? {
        tracing::info!("Refused login for banned user {}", user.id);
        return Err(ApiError::forbidden(format!("User is banned: {}", ban.describe())));
    }

    let session = state.auth.issue_session(&user).await?;
    tracing::debug!("Issued session for {}", user.id);

    Ok(ApiResponse::success(json!({
        "token": session.token,
        "user": user,
        "expires_in": session.expires_in,
        "expires_at": session.expires_at,
    })))
}
