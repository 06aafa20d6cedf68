// Correlated request bridge
//
// Turns a fire-and-forget work emission into a synchronous-looking call:
// the caller writes a pending marker, publishes work carrying the correlation
// id, then polls the shared store until a worker writes a terminal record or
// the budget runs out. Caller and worker share nothing but the store.

pub mod id;
pub mod postgres;
pub mod queue;
pub mod record;
pub mod store;
pub mod worker;

pub use id::CorrelationId;
pub use postgres::PgCorrelationStore;
pub use queue::{EventPublisher, InProcessQueue, PublishError, RegistrationError, WorkerRuntime};
pub use record::{CorrelationRecord, DEFAULT_FAILURE_STATUS, TIMEOUT_MESSAGE, TIMEOUT_STATUS};
pub use store::{CorrelationStore, InMemoryCorrelationStore, StoreError};
pub use worker::{to_data, WorkEnvelope, Worker, WorkerFailure};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::auth::Actor;

/// Correlation groups used across the API
pub mod groups {
    pub const ORG_REQUESTS: &str = "org-requests";
    pub const ADMIN_REQUESTS: &str = "admin-requests";
    pub const APIKEY_REQUESTS: &str = "apikey-requests";
    pub const RAG_WORKFLOW: &str = "rag-workflow";
    /// Who submitted each ingest, keyed by its correlation id
    pub const RAG_INGEST_OWNERS: &str = "rag-ingest-owners";
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Failed to encode correlation record: {0}")]
    Encode(serde_json::Error),

    #[error("Unreadable record at {group}/{id}: {source}")]
    Decode {
        group: String,
        id: CorrelationId,
        source: serde_json::Error,
    },
}

/// Timing knobs for callers waiting on workers
#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    pub poll_interval: Duration,
    pub default_timeout: Duration,
    pub long_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            default_timeout: Duration::from_secs(10),
            long_timeout: Duration::from_secs(60),
        }
    }
}

pub(crate) async fn write_record<T: Serialize>(
    store: &dyn CorrelationStore,
    group: &str,
    id: &CorrelationId,
    record: &CorrelationRecord<T>,
) -> Result<(), BridgeError> {
    let value = serde_json::to_value(record).map_err(BridgeError::Encode)?;
    store.set(group, id.as_str(), value).await?;
    Ok(())
}

/// Read whatever is currently stored for an exchange, without waiting
pub async fn read_record<T: DeserializeOwned>(
    store: &dyn CorrelationStore,
    group: &str,
    id: &CorrelationId,
) -> Result<Option<CorrelationRecord<T>>, BridgeError> {
    match store.get(group, id.as_str()).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| BridgeError::Decode {
                group: group.to_string(),
                id: id.clone(),
                source,
            }),
        None => Ok(None),
    }
}

/// Mark an exchange as pending. Must happen before the work is published.
pub async fn init_request(
    store: &dyn CorrelationStore,
    group: &str,
    id: &CorrelationId,
) -> Result<(), BridgeError> {
    write_record::<()>(store, group, id, &CorrelationRecord::Pending).await
}

/// Poll until a terminal record shows up or `budget` elapses.
///
/// On elapse a 504 failure is synthesized for the caller; the stored record is
/// left untouched, so a late worker write lands in a record nobody reads.
pub async fn await_result<T: DeserializeOwned>(
    store: &dyn CorrelationStore,
    group: &str,
    id: &CorrelationId,
    budget: Duration,
    poll_interval: Duration,
) -> Result<CorrelationRecord<T>, BridgeError> {
    await_until(store, group, id, Instant::now() + budget, poll_interval).await
}

/// Poll until a terminal record shows up or the clock reaches `deadline`
pub async fn await_until<T: DeserializeOwned>(
    store: &dyn CorrelationStore,
    group: &str,
    id: &CorrelationId,
    deadline: Instant,
    poll_interval: Duration,
) -> Result<CorrelationRecord<T>, BridgeError> {
    let started = Instant::now();
    let interval = poll_interval.max(Duration::from_millis(1));
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        if let Some(record) = read_record::<T>(store, group, id).await? {
            if record.is_terminal() {
                tracing::debug!(
                    "Correlation {}/{} resolved after {} polls in {:?}",
                    group, id, polls, started.elapsed()
                );
                return Ok(record);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                "Correlation {}/{} timed out after {:?} ({} polls)",
                group, id, started.elapsed(), polls
            );
            return Ok(CorrelationRecord::timed_out());
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Facade bundling the store, the publisher and the timing options
#[derive(Clone)]
pub struct RequestBridge {
    store: Arc<dyn CorrelationStore>,
    publisher: Arc<dyn EventPublisher>,
    options: BridgeOptions,
}

impl RequestBridge {
    pub fn new(
        store: Arc<dyn CorrelationStore>,
        publisher: Arc<dyn EventPublisher>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            store,
            publisher,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn CorrelationStore> {
        &self.store
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Start an exchange without waiting for it: init, then publish
    pub async fn submit<P: Serialize>(
        &self,
        group: &str,
        topic: &str,
        actor: Option<&Actor>,
        payload: &P,
    ) -> Result<CorrelationId, BridgeError> {
        let id = CorrelationId::generate();
        let payload: Value = serde_json::to_value(payload).map_err(BridgeError::Encode)?;

        init_request(self.store.as_ref(), group, &id).await?;

        let envelope = WorkEnvelope::new(id.clone(), group, topic, actor.cloned(), payload);
        self.publisher.publish(envelope).await?;

        tracing::debug!("Submitted {} as {}/{}", topic, group, id);
        Ok(id)
    }

    /// Full round trip with an explicit budget, counted from before the
    /// pending marker is written
    pub async fn dispatch_with<P: Serialize, T: DeserializeOwned>(
        &self,
        group: &str,
        topic: &str,
        actor: Option<&Actor>,
        payload: &P,
        budget: Duration,
    ) -> Result<CorrelationRecord<T>, BridgeError> {
        let deadline = Instant::now() + budget;
        let id = self.submit(group, topic, actor, payload).await?;
        await_until(self.store.as_ref(), group, &id, deadline, self.options.poll_interval).await
    }

    /// Full round trip with the default budget
    pub async fn dispatch<P: Serialize, T: DeserializeOwned>(
        &self,
        group: &str,
        topic: &str,
        actor: Option<&Actor>,
        payload: &P,
    ) -> Result<CorrelationRecord<T>, BridgeError> {
        self.dispatch_with(group, topic, actor, payload, self.options.default_timeout)
            .await
    }

    pub async fn status<T: DeserializeOwned>(
        &self,
        group: &str,
        id: &CorrelationId,
    ) -> Result<Option<CorrelationRecord<T>>, BridgeError> {
        read_record(self.store.as_ref(), group, id).await
    }
}
