use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{expiry_from_days, topics};
use crate::auth::{Actor, AuthProvider, Role};
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanUser {
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUserRole {
    pub user_id: Uuid,
    pub role: Role,
}

/// Privileged user management, delegated to the auth engine
pub struct AdminWorker {
    auth: Arc<dyn AuthProvider>,
}

impl AdminWorker {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    async fn require_admin<'a>(&self, work: &'a WorkEnvelope) -> Result<&'a Actor, WorkerFailure> {
        let actor = work.require_actor()?;
        if !self.auth.check_role(actor.user_id, Role::Admin).await? {
            return Err(WorkerFailure::forbidden("Admin role required"));
        }
        Ok(actor)
    }
}

#[async_trait]
impl Worker for AdminWorker {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::ADMIN_BAN_USER, topics::ADMIN_UNBAN_USER, topics::ADMIN_SET_ROLE]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        let actor = self.require_admin(work).await?;

        match work.topic.as_str() {
            topics::ADMIN_BAN_USER => {
                let input: BanUser = work.decode()?;
                if input.user_id == actor.user_id {
                    return Err(WorkerFailure::bad_request("You cannot ban yourself"));
                }
                let expires_at = expiry_from_days(input.expires_in_days)?;

                let user = self.auth.ban_user(input.user_id, input.reason.clone(), expires_at).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, user_id = %user.id, reason = ?input.reason, "user banned");
                to_data(user)
            }
            topics::ADMIN_UNBAN_USER => {
                let input: UserRef = work.decode()?;
                let user = self.auth.unban_user(input.user_id).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, user_id = %user.id, "user unbanned");
                to_data(user)
            }
            topics::ADMIN_SET_ROLE => {
                let input: SetUserRole = work.decode()?;
                if input.user_id == actor.user_id && input.role != Role::Admin {
                    return Err(WorkerFailure::bad_request("You cannot remove your own admin role"));
                }

                let user = self.auth.set_role(input.user_id, input.role).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, user_id = %user.id, role = %input.role, "user role changed");
                to_data(user)
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryAuthProvider;
    use crate::bridge::CorrelationId;
    use serde_json::json;

    fn envelope(actor: &Actor, topic: &str, payload: Value) -> WorkEnvelope {
        WorkEnvelope::new(CorrelationId::generate(), "admin-requests", topic, Some(actor.clone()), payload)
    }

    #[tokio::test]
    async fn admin_bans_and_unbans() {
        let auth = Arc::new(InMemoryAuthProvider::new("secret", 1));
        let admin = auth.seed_admin("root@example.com", "Root", "password1").await.unwrap();
        let user = auth.register("u@example.com", "U", "password2").await.unwrap();
        let worker = AdminWorker::new(auth.clone());

        let banned = worker
            .handle(&envelope(&admin.actor(), topics::ADMIN_BAN_USER, json!({ "userId": user.id, "reason": "spam" })))
            .await
            .unwrap();
        assert_eq!(banned["banned"], true);
        assert!(auth.check_ban(user.id).await.unwrap().is_some());

        worker
            .handle(&envelope(&admin.actor(), topics::ADMIN_UNBAN_USER, json!({ "userId": user.id })))
            .await
            .unwrap();
        assert!(auth.check_ban(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_cannot_ban_self() {
        let auth = Arc::new(InMemoryAuthProvider::new("secret", 1));
        let admin = auth.seed_admin("root@example.com", "Root", "password1").await.unwrap();
        let worker = AdminWorker::new(auth);

        let failure = worker
            .handle(&envelope(&admin.actor(), topics::ADMIN_BAN_USER, json!({ "userId": admin.id })))
            .await
            .unwrap_err();
        assert_eq!(failure, WorkerFailure::bad_request("You cannot ban yourself"));
    }

    #[tokio::test]
    async fn role_is_rechecked_against_the_auth_engine() {
        let auth = Arc::new(InMemoryAuthProvider::new("secret", 1));
        let user = auth.register("u@example.com", "U", "password2").await.unwrap();
        let worker = AdminWorker::new(auth);

        // claims say admin, the engine says otherwise
        let mut forged = user.actor();
        forged.role = Role::Admin;
        let failure = worker
            .handle(&envelope(&forged, topics::ADMIN_SET_ROLE, json!({ "userId": user.id, "role": "admin" })))
            .await
            .unwrap_err();
        assert_eq!(failure.status_code, Some(403));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let auth = Arc::new(InMemoryAuthProvider::new("secret", 1));
        let admin = auth.seed_admin("root@example.com", "Root", "password1").await.unwrap();
        let worker = AdminWorker::new(auth);

        let failure = worker
            .handle(&envelope(&admin.actor(), topics::ADMIN_UNBAN_USER, json!({ "userId": Uuid::new_v4() })))
            .await
            .unwrap_err();
        assert_eq!(failure.status_code, Some(404));
    }

    #[tokio::test]
    async fn oversized_ban_expiry_is_rejected() {
        let auth = Arc::new(InMemoryAuthProvider::new("secret", 1));
        let admin = auth.seed_admin("root@example.com", "Root", "password1").await.unwrap();
        let user = auth.register("u@example.com", "U", "password2").await.unwrap();
        let worker = AdminWorker::new(auth.clone());

        let failure = worker
            .handle(&envelope(
                &admin.actor(),
                topics::ADMIN_BAN_USER,
                json!({ "userId": user.id, "expiresInDays": 9_000_000_000_000i64 }),
            ))
            .await
            .unwrap_err();
        assert_eq!(failure.status_code, Some(400));
        assert!(auth.check_ban(user.id).await.unwrap().is_none());
    }
}
