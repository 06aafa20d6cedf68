// Background workers answering correlated requests

pub mod admin;
pub mod api_keys;
pub mod invitations;
pub mod members;
pub mod organizations;
pub mod rag;

pub use admin::AdminWorker;
pub use api_keys::ApiKeyWorker;
pub use invitations::InvitationWorker;
pub use members::MemberWorker;
pub use organizations::OrganizationWorker;
pub use rag::RagWorker;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::auth::{AuthError, AuthProvider};
use crate::bridge::{RegistrationError, WorkerFailure, WorkerRuntime};
use crate::rag::{RagError, RagPipeline};
use crate::services::directory::{Directory, DirectoryError};

/// Work topics, one registration each
pub mod topics {
    pub const ORG_CREATE: &str = "org.create";
    pub const ORG_UPDATE: &str = "org.update";
    pub const ORG_DELETE: &str = "org.delete";

    pub const MEMBER_ADD: &str = "member.add";
    pub const MEMBER_UPDATE_ROLE: &str = "member.update_role";
    pub const MEMBER_REMOVE: &str = "member.remove";

    pub const INVITATION_CREATE: &str = "invitation.create";
    pub const INVITATION_ACCEPT: &str = "invitation.accept";
    pub const INVITATION_CANCEL: &str = "invitation.cancel";

    pub const APIKEY_CREATE: &str = "apikey.create";
    pub const APIKEY_REVOKE: &str = "apikey.revoke";

    pub const ADMIN_BAN_USER: &str = "admin.ban_user";
    pub const ADMIN_UNBAN_USER: &str = "admin.unban_user";
    pub const ADMIN_SET_ROLE: &str = "admin.set_role";

    pub const RAG_QUERY: &str = "rag.query.requested";
    pub const RAG_INGEST: &str = "rag.ingest.requested";
}

/// Longest expiry accepted for bans and API keys
pub const MAX_EXPIRY_DAYS: i64 = 3650;

pub fn expiry_message() -> String {
    format!("expiresInDays must be between 1 and {}", MAX_EXPIRY_DAYS)
}

/// Turn an optional day count into an absolute expiry
pub fn expiry_from_days(days: Option<i64>) -> Result<Option<DateTime<Utc>>, WorkerFailure> {
    let Some(days) = days else {
        return Ok(None);
    };
    if !(1..=MAX_EXPIRY_DAYS).contains(&days) {
        return Err(WorkerFailure::bad_request(expiry_message()));
    }
    Duration::try_days(days)
        .and_then(|span| Utc::now().checked_add_signed(span))
        .map(Some)
        .ok_or_else(|| WorkerFailure::bad_request(expiry_message()))
}

impl From<DirectoryError> for WorkerFailure {
    fn from(err: DirectoryError) -> Self {
        WorkerFailure::new(err.to_string(), Some(err.status_code()))
    }
}

impl From<AuthError> for WorkerFailure {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::UserNotFound => 404,
            AuthError::EmailTaken(_) => 409,
            AuthError::InvalidCredentials | AuthError::Jwt(_) => 401,
            AuthError::Banned(_) => 403,
        };
        WorkerFailure::new(err.to_string(), Some(status))
    }
}

impl From<RagError> for WorkerFailure {
    fn from(err: RagError) -> Self {
        if err.status_code() >= 500 {
            tracing::error!("Document pipeline failure: {}", err);
        }
        WorkerFailure::new(err.to_string(), Some(err.status_code()))
    }
}

/// Register every worker the API depends on
pub fn register_all(
    runtime: &mut WorkerRuntime,
    directory: Arc<Directory>,
    auth: Arc<dyn AuthProvider>,
    rag: Arc<RagPipeline>,
) -> Result<(), RegistrationError> {
    runtime.register(Arc::new(OrganizationWorker::new(directory.clone())))?;
    runtime.register(Arc::new(MemberWorker::new(directory.clone(), auth.clone())))?;
    runtime.register(Arc::new(InvitationWorker::new(directory.clone())))?;
    runtime.register(Arc::new(ApiKeyWorker::new(directory)))?;
    runtime.register(Arc::new(AdminWorker::new(auth)))?;
    runtime.register(Arc::new(RagWorker::new(rag)))?;
    Ok(())
}
