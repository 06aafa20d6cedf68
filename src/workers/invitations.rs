use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::topics;
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};
use crate::services::directory::{Directory, MemberRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitation {
    pub org_id: String,
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitation {
    pub invitation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInvitation {
    pub org_id: String,
    pub invitation_id: String,
}

pub struct InvitationWorker {
    directory: Arc<Directory>,
}

impl InvitationWorker {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Worker for InvitationWorker {
    fn name(&self) -> &'static str {
        "invitations"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::INVITATION_CREATE, topics::INVITATION_ACCEPT, topics::INVITATION_CANCEL]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        let actor = work.require_actor()?;

        match work.topic.as_str() {
            topics::INVITATION_CREATE => {
                let input: CreateInvitation = work.decode()?;
                let invitation = self
                    .directory
                    .create_invitation(actor.user_id, &input.org_id, &input.email, input.role)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %input.org_id, invitation_id = %invitation.id, "invitation created");
                to_data(invitation)
            }
            topics::INVITATION_ACCEPT => {
                let input: AcceptInvitation = work.decode()?;
                let membership = self
                    .directory
                    .accept_invitation(actor.user_id, &actor.email, &input.invitation_id)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %membership.organization_id, invitation_id = %input.invitation_id, "invitation accepted");
                to_data(membership)
            }
            topics::INVITATION_CANCEL => {
                let input: CancelInvitation = work.decode()?;
                let invitation = self
                    .directory
                    .cancel_invitation(actor.user_id, &input.org_id, &input.invitation_id)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %input.org_id, invitation_id = %invitation.id, "invitation cancelled");
                to_data(invitation)
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}
