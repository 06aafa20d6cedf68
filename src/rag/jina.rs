use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Embedder, Embedding, RagError, RerankResult, Reranker};
use crate::config::RagConfig;

/// Jina embeddings and reranker APIs, sharing one key
pub struct JinaClient {
    client: reqwest::Client,
    api_key: Option<String>,
    embeddings_url: String,
    embeddings_model: String,
    rerank_url: String,
    rerank_model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

impl JinaClient {
    pub fn from_config(client: reqwest::Client, config: &RagConfig) -> Self {
        Self {
            client,
            api_key: config.jina_api_key.clone(),
            embeddings_url: config.jina_embeddings_url.clone(),
            embeddings_model: config.jina_embeddings_model.clone(),
            rerank_url: config.jina_rerank_url.clone(),
            rerank_model: config.jina_rerank_model.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, RagError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(RagError::NotConfigured("JINA_API_KEY"))
    }

    pub fn embedding_request(&self, texts: &[String]) -> Value {
        json!({
            "model": self.embeddings_model,
            "normalized": true,
            "embedding_type": "float",
            "input": texts,
        })
    }

    pub fn rerank_request(&self, query: &str, documents: &[String], top_n: usize) -> Value {
        json!({
            "model": self.rerank_model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
            "return_documents": false,
        })
    }

    async fn post(&self, service: &'static str, url: &str, body: &Value) -> Result<Value, RagError> {
        let api_key = self.api_key()?;
        self.client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::upstream(service, e))?
            .error_for_status()
            .map_err(|e| RagError::upstream(service, e))?
            .json::<Value>()
            .await
            .map_err(|e| RagError::upstream(service, e))
    }
}

/// Embeddings in input order, regardless of the order the API lists them
fn parse_embeddings(body: Value, expected: usize) -> Result<Vec<Embedding>, RagError> {
    let mut response: EmbeddingResponse =
        serde_json::from_value(body).map_err(|e| RagError::invalid("embeddings", e.to_string()))?;
    if response.data.len() != expected {
        return Err(RagError::invalid(
            "embeddings",
            format!("expected {} embeddings, got {}", expected, response.data.len()),
        ));
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

fn parse_rerank(body: Value) -> Result<Vec<RerankResult>, RagError> {
    serde_json::from_value::<RerankResponse>(body)
        .map(|r| r.results)
        .map_err(|e| RagError::invalid("reranker", e.to_string()))
}

#[async_trait]
impl Embedder for JinaClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .post("embeddings", &self.embeddings_url, &self.embedding_request(texts))
            .await?;
        let embeddings = parse_embeddings(body, texts.len())?;
        tracing::debug!(
            "Embedded {} texts (dimension {})",
            embeddings.len(),
            embeddings.first().map(Vec::len).unwrap_or(0)
        );
        Ok(embeddings)
    }
}

#[async_trait]
impl Reranker for JinaClient {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankResult>, RagError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .post("reranker", &self.rerank_url, &self.rerank_request(query, documents, top_n))
            .await?;
        parse_rerank(body)
    }
}
