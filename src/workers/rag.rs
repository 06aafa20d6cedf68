use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::topics;
use crate::bridge::{to_data, WorkEnvelope, Worker, WorkerFailure};
use crate::rag::{RagPipeline, MAX_QUERY_LIMIT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequested {
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequested {
    pub folder: String,
}

pub struct RagWorker {
    pipeline: Arc<RagPipeline>,
}

impl RagWorker {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Worker for RagWorker {
    fn name(&self) -> &'static str {
        "rag"
    }

    fn topics(&self) -> &'static [&'static str] {
        &[topics::RAG_QUERY, topics::RAG_INGEST]
    }

    async fn handle(&self, work: &WorkEnvelope) -> Result<Value, WorkerFailure> {
        match work.topic.as_str() {
            topics::RAG_QUERY => {
                let input: QueryRequested = work.decode()?;
                if input.query.trim().is_empty() {
                    return Err(WorkerFailure::bad_request("query must not be empty"));
                }
                if !(1..=MAX_QUERY_LIMIT).contains(&input.limit) {
                    return Err(WorkerFailure::bad_request(format!(
                        "limit must be between 1 and {}",
                        MAX_QUERY_LIMIT
                    )));
                }

                let answer = self.pipeline.query(&input.query, input.limit).await?;
                to_data(answer)
            }
            topics::RAG_INGEST => {
                let input: IngestRequested = work.decode()?;
                let report = self.pipeline.ingest(&input.folder).await?;
                tracing::info!(
                    "Ingested {} chunks from {} files in '{}'",
                    report.chunks,
                    report.files.len(),
                    report.folder
                );
                to_data(report)
            }
            other => Err(WorkerFailure::internal(format!("Unsupported topic '{}'", other))),
        }
    }
}
