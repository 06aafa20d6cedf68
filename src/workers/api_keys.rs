use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{expiry_from_days, topics};
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};
use crate::services::directory::Directory;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKey {
    pub name: String,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeApiKey {
    pub key_id: String,
}

pub struct ApiKeyWorker {
    directory: Arc<Directory>,
}

impl ApiKeyWorker {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Worker for ApiKeyWorker {
    fn name(&self) -> &'static str {
        "api-keys"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::APIKEY_CREATE, topics::APIKEY_REVOKE]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        let actor = work.require_actor()?;

        match work.topic.as_str() {
            topics::APIKEY_CREATE => {
                let input: CreateApiKey = work.decode()?;
                let expires_at = expiry_from_days(input.expires_in_days)?;

                let issued = self.directory.create_api_key(actor.user_id, &input.name, expires_at).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, key_id = %issued.key.id, prefix = %issued.key.prefix, "api key created");
                to_data(issued)
            }
            topics::APIKEY_REVOKE => {
                let input: RevokeApiKey = work.decode()?;
                let key = self.directory.revoke_api_key(actor.user_id, &input.key_id).await?;
                tracing::info!(target: "audit", actor = %actor.user_id, key_id = %key.id, "api key revoked");
                to_data(key)
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}
