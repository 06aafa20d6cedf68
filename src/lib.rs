pub mod api;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rag;
pub mod services;
pub mod state;
pub mod testing;
pub mod workers;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::middleware::{jwt_auth_middleware, require_admin_middleware};
use crate::state::AppState;

/// Build the full router over shared state
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let body_limit = state.config.api.max_request_size_bytes;

    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        // Elevated API
        .merge(admin_routes(state.clone()))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(origins)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use handlers::protected::{api_keys, auth, invitations, members, organizations, rag};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        // Organizations
        .route(
            "/api/organizations",
            get(organizations::list).post(organizations::create),
        )
        .route(
            "/api/organizations/:org_id",
            get(organizations::show)
                .patch(organizations::update)
                .delete(organizations::delete),
        )
        // Members
        .route("/api/organizations/:org_id/members", post(members::add))
        .route(
            "/api/organizations/:org_id/members/:user_id",
            axum::routing::patch(members::update_role).delete(members::remove),
        )
        // Invitations
        .route(
            "/api/organizations/:org_id/invitations",
            get(invitations::list).post(invitations::create),
        )
        .route(
            "/api/organizations/:org_id/invitations/:invitation_id",
            axum::routing::delete(invitations::cancel),
        )
        .route("/api/invitations/:invitation_id/accept", post(invitations::accept))
        // API keys
        .route("/api/api-keys", get(api_keys::list).post(api_keys::create))
        .route("/api/api-keys/:key_id", axum::routing::delete(api_keys::revoke))
        // Document QA
        .route("/api/rag/query", post(rag::query))
        .route("/api/rag/ingest", post(rag::ingest))
        .route("/api/rag/ingest/:request_id", get(rag::status))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    use handlers::elevated::admin;

    Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:user_id/ban", post(admin::ban))
        .route("/api/admin/users/:user_id/unban", post(admin::unban))
        .route("/api/admin/users/:user_id/role", axum::routing::put(admin::set_role))
        // Session check runs first, then the role check
        .route_layer(from_fn_with_state(state.clone(), require_admin_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}
