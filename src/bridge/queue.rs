// In-process work queue and the runtime that routes envelopes to workers

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::record::CorrelationRecord;
use super::store::CorrelationStore;
use super::worker::{process_envelope, WorkEnvelope, Worker};
use super::write_record;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Work queue is closed")]
    Closed,

    #[error("Failed to publish work: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Topic '{topic}' is already handled by worker '{existing}'")]
    DuplicateTopic { topic: String, existing: &'static str },
}

/// Fire-and-forget hand-off of work to whatever runs the workers
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: WorkEnvelope) -> Result<(), PublishError>;
}

/// Unbounded tokio channel standing in for an external queue
#[derive(Clone)]
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<WorkEnvelope>,
}

impl InProcessQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for InProcessQueue {
    async fn publish(&self, envelope: WorkEnvelope) -> Result<(), PublishError> {
        tracing::debug!("Publishing {} ({})", envelope.topic, envelope.correlation_id);
        self.sender.send(envelope).map_err(|_| PublishError::Closed)
    }
}

/// Routes each envelope to the single worker registered for its topic
pub struct WorkerRuntime {
    store: Arc<dyn CorrelationStore>,
    routes: HashMap<&'static str, Arc<dyn Worker>>,
}

impl WorkerRuntime {
    pub fn new(store: Arc<dyn CorrelationStore>) -> Self {
        Self {
            store,
            routes: HashMap::new(),
        }
    }

    /// Register a worker for all of its topics
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Result<(), RegistrationError> {
        for topic in worker.topics() {
            if let Some(existing) = self.routes.get(topic) {
                return Err(RegistrationError::DuplicateTopic {
                    topic: topic.to_string(),
                    existing: existing.name(),
                });
            }
        }

        for &topic in worker.topics() {
            self.routes.insert(topic, worker.clone());
        }

        tracing::debug!("Registered worker '{}' for topics {:?}", worker.name(), worker.topics());
        Ok(())
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Result<Self, RegistrationError> {
        self.register(worker)?;
        Ok(self)
    }

    pub fn topics(&self) -> Vec<&'static str> {
        let mut topics: Vec<_> = self.routes.keys().copied().collect();
        topics.sort_unstable();
        topics
    }

    /// Hand one envelope to its worker on a fresh task
    pub fn dispatch(&self, envelope: WorkEnvelope) -> JoinHandle<()> {
        let store = self.store.clone();
        let worker = self.routes.get(envelope.topic.as_str()).cloned();

        tokio::spawn(async move {
            let result = match worker {
                Some(worker) => process_envelope(store.as_ref(), worker.as_ref(), &envelope).await,
                None => {
                    tracing::warn!("No worker subscribed to topic '{}'", envelope.topic);
                    let record: CorrelationRecord<()> = CorrelationRecord::failed(
                        format!("No worker registered for '{}'", envelope.topic),
                        Some(500),
                    );
                    write_record(store.as_ref(), &envelope.group, &envelope.correlation_id, &record).await
                }
            };

            if let Err(e) = result {
                tracing::error!(
                    "Terminal write for {} ({}) failed: {}",
                    envelope.topic, envelope.correlation_id, e
                );
            }
        })
    }

    /// Drain the queue until every sender is dropped
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<WorkEnvelope>) {
        tracing::info!("Worker runtime started with topics {:?}", self.topics());
        while let Some(envelope) = receiver.recv().await {
            self.dispatch(envelope);
        }
        tracing::info!("Worker runtime stopped: queue closed");
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<WorkEnvelope>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}
