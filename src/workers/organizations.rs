use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::topics;
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};
use crate::services::directory::Directory;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganization {
    pub org_id: String,
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRef {
    pub org_id: String,
}

pub struct OrganizationWorker {
    directory: Arc<Directory>,
}

impl OrganizationWorker {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Worker for OrganizationWorker {
    fn name(&self) -> &'static str {
        "organizations"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::ORG_CREATE, topics::ORG_UPDATE, topics::ORG_DELETE]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        let actor = work.require_actor()?;

        match work.topic.as_str() {
            topics::ORG_CREATE => {
                let input: CreateOrganization = work.decode()?;
                let org = self
                    .directory
                    .create_organization(actor.user_id, &input.name, &input.slug)
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %org.id, slug = %org.slug, "organization created");
                to_data(org)
            }
            topics::ORG_UPDATE => {
                let input: UpdateOrganization = work.decode()?;
                let org = self
                    .directory
                    .update_organization(actor.user_id, &input.org_id, input.name.as_deref(), input.slug.as_deref())
                    .await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %org.id, "organization updated");
                to_data(org)
            }
            topics::ORG_DELETE => {
                let input: OrganizationRef = work.decode()?;
                let org = self.directory.delete_organization(actor.user_id, &input.org_id).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, org_id = %org.id, "organization deleted");
                Ok(json!({ "id": org.id, "deleted": true }))
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}
