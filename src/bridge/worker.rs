use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;

use super::id::CorrelationId;
use super::record::CorrelationRecord;
use super::store::CorrelationStore;
use super::{write_record, BridgeError};
use crate::auth::Actor;

/// Unit of work handed to the queue.
///
/// Carries the correlation id and group so the worker can address the record
/// the caller is polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEnvelope {
    pub correlation_id: CorrelationId,
    pub group: String,
    pub topic: String,
    pub actor: Option<Actor>,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl WorkEnvelope {
    pub fn new(
        correlation_id: CorrelationId,
        group: impl Into<String>,
        topic: impl Into<String>,
        actor: Option<Actor>,
        payload: Value,
    ) -> Self {
        Self {
            correlation_id,
            group: group.into(),
            topic: topic.into(),
            actor,
            payload,
            published_at: Utc::now(),
        }
    }

    /// Deserialize the operation fields into the worker's input type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, WorkerFailure> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| WorkerFailure::bad_request(format!("Invalid payload for {}: {}", self.topic, e)))
    }

    /// Acting user, required by every organization and admin operation
    pub fn require_actor(&self) -> Result<&Actor, WorkerFailure> {
        self.actor
            .as_ref()
            .ok_or_else(|| WorkerFailure::new("Authenticated actor required", Some(401)))
    }
}

/// Business-rule rejection reported back to the caller verbatim
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct WorkerFailure {
    pub message: String,
    pub status_code: Option<u16>,
}

impl WorkerFailure {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, Some(400))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, Some(403))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, Some(404))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(message, Some(409))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, Some(500))
    }
}

/// Serialize a worker's typed result into the completed payload
pub fn to_data<T: Serialize>(data: T) -> Result<Value, WorkerFailure> {
    serde_json::to_value(data).map_err(|e| {
        tracing::error!("Failed to serialize worker result: {}", e);
        WorkerFailure::internal("Failed to format worker result")
    })
}

/// Background handler participating in a correlated exchange
#[async_trait]
pub trait Worker: Send + Sync {
    /// Worker name for logging
    fn name(&self) -> &'static str;

    /// Topics this worker consumes
    fn topics(&self) -> &'static [&'static str];

    /// Perform the unit of work. `Ok` becomes `Completed`, `Err` becomes `Failed`.
    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure>;
}

/// Run one envelope through a worker and perform its single terminal write.
///
/// If the worker panics the write never happens and the record stays pending.
pub async fn process_envelope(
    store: &dyn CorrelationStore,
    worker: &dyn Worker,
    envelope: &WorkEnvelope,
) -> Result<(), BridgeError> {
    let started = Instant::now();

    let record = match worker.handle(envelope).await {
        Ok(data) => {
            tracing::debug!(
                "Worker '{}' completed {} ({}) in {:?}",
                worker.name(), envelope.topic, envelope.correlation_id, started.elapsed()
            );
            CorrelationRecord::completed(data)
        }
        Err(failure) => {
            tracing::warn!(
                "Worker '{}' rejected {} ({}): {}",
                worker.name(), envelope.topic, envelope.correlation_id, failure.message
            );
            CorrelationRecord::failed(failure.message, failure.status_code)
        }
    };

    write_record(store, &envelope.group, &envelope.correlation_id, &record).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::store::InMemoryCorrelationStore;
    use serde_json::json;

    struct EchoWorker;

    #[async_trait]
    impl Worker for EchoWorker {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn topics(&self) -> &'static [&'static str] {
            &["test.echo"]
        }

        async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
            if work.payload.get("fail").is_some() {
                return Err(WorkerFailure::not_found("Organization not found"));
            }
            Ok(work.payload.clone())
        }
    }

    fn envelope(payload: Value) -> WorkEnvelope {
        WorkEnvelope::new(CorrelationId::from("abc"), "org-requests", "test.echo", None, payload)
    }

    #[tokio::test]
    async fn success_writes_completed_record() {
        let store = InMemoryCorrelationStore::new();
        let work = envelope(json!({ "organizationId": "org_1" }));

        process_envelope(&store, &EchoWorker, &work).await.unwrap();

        assert_eq!(
            store.get("org-requests", "abc").await.unwrap(),
            Some(json!({ "status": "completed", "data": { "organizationId": "org_1" } }))
        );
    }

    #[tokio::test]
    async fn failure_writes_failed_record_with_status() {
        let store = InMemoryCorrelationStore::new();
        let work = envelope(json!({ "fail": true }));

        process_envelope(&store, &EchoWorker, &work).await.unwrap();

        assert_eq!(
            store.get("org-requests", "abc").await.unwrap(),
            Some(json!({ "status": "failed", "error": "Organization not found", "statusCode": 404 }))
        );
    }

    #[test]
    fn decode_mismatch_is_bad_request() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            name: String,
        }

        let err = envelope(json!({})).decode::<Needs>().unwrap_err();
        assert_eq!(err.status_code, Some(400));
        assert!(err.message.contains("test.echo"));
    }

    #[test]
    fn envelope_carries_correlation_fields() {
        let value = serde_json::to_value(envelope(json!({ "x": 1 }))).unwrap();
        assert_eq!(value["correlationId"], "abc");
        assert_eq!(value["group"], "org-requests");
        assert_eq!(value["topic"], "test.echo");
    }
}
