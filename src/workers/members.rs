use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::topics;
use crate::auth::AuthProvider;
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};
use crate::services::directory::{Directory, MemberRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    pub org_id: String,
    pub user_id: Uuid,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub org_id: String,
    pub user_id: Uuid,
}

pub struct MemberWorker {
    directory: Arc<Directory>,
    auth: Arc<dyn AuthProvider>,
}

impl MemberWorker {
    pub fn new(directory: Arc<Directory>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { directory, auth }
    }
}

#[async_trait]
impl Worker for MemberWorker {
    fn name(&self) -> &'static str {
        "members"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::MEMBER_ADD, topics::MEMBER_UPDATE_ROLE, topics::MEMBER_REMOVE]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        let actor = work.require_actor()?;

        match work.topic.as_str() {
            topics::MEMBER_ADD => {
                let input: MemberChange = work.decode()?;
                if self.auth.find_user(input.user_id).await?.is_none() {
                    return Err(WorkerFailure::not_found("User not found"));
                }

                let membership = self
                    .directory
                    .add_member(actor.user_id, &input.org_id, input.user_id, input.role)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %input.org_id, user_id = %input.user_id, role = ?input.role, "member added");
                to_data(membership)
            }
            topics::MEMBER_UPDATE_ROLE => {
                let input: MemberChange = work.decode()?;
                let membership = self
                    .directory
                    .update_member_role(actor.user_id, &input.org_id, input.user_id, input.role)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %input.org_id, user_id = %input.user_id, role = ?input.role, "member role changed");
                to_data(membership)
            }
            topics::MEMBER_REMOVE => {
                let input: MemberRef = work.decode()?;
                let membership = self
                    .directory
                    .remove_member(actor.user_id, &input.org_id, input.user_id)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %input.org_id, user_id = %input.user_id, "member removed");
                to_data(membership)
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}
