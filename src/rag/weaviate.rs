use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::{ChunkMetadata, DocumentChunk, Embedding, RagError, SearchHit, VectorStore};
use crate::config::RagConfig;

const SERVICE: &str = "weaviate";

/// Weaviate over REST: batch object insert and GraphQL `nearVector` search
pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    collection: String,
}

impl WeaviateStore {
    pub fn from_config(client: reqwest::Client, config: &RagConfig) -> Self {
        Self {
            client,
            base_url: config.weaviate_url.clone(),
            api_key: config.weaviate_api_key.clone(),
            collection: config.weaviate_collection.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, RagError> {
        let base = self
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(RagError::NotConfigured("WEAVIATE_URL"))?;
        Url::parse(base)
            .and_then(|u| u.join(path))
            .map_err(|e| RagError::invalid(SERVICE, format!("bad WEAVIATE_URL: {}", e)))
    }

    pub fn batch_request(&self, chunks: &[DocumentChunk], vectors: &[Embedding]) -> Value {
        let objects: Vec<Value> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                json!({
                    "class": self.collection,
                    "properties": {
                        "text": chunk.text,
                        "title": chunk.title,
                        "source": chunk.metadata.source,
                        "page": chunk.metadata.page,
                    },
                    "vector": vector,
                })
            })
            .collect();
        json!({ "objects": objects })
    }

    pub fn search_request(&self, vector: &[f32], limit: usize) -> Value {
        let vector = serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string());
        json!({
            "query": format!(
                "{{ Get {{ {}(nearVector: {{vector: {}}}, limit: {}) {{ text title source page _additional {{ distance }} }} }} }}",
                self.collection, vector, limit
            )
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RagError> {
        let mut request = self.client.post(self.endpoint(path)?).json(body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        request
            .send()
            .await
            .map_err(|e| RagError::upstream(SERVICE, e))?
            .error_for_status()
            .map_err(|e| RagError::upstream(SERVICE, e))?
            .json::<Value>()
            .await
            .map_err(|e| RagError::upstream(SERVICE, e))
    }
}

/// Count batch objects that came back without per-object errors
fn parse_batch(body: &Value) -> Result<usize, RagError> {
    let objects = body
        .as_array()
        .ok_or_else(|| RagError::invalid(SERVICE, "batch response is not an array"))?;

    let mut stored = 0;
    for object in objects {
        match object.pointer("/result/errors") {
            Some(errors) if !errors.is_null() => {
                tracing::warn!("Weaviate rejected object: {}", errors);
            }
            _ => stored += 1,
        }
    }
    Ok(stored)
}

fn parse_search(body: &Value, collection: &str) -> Result<Vec<SearchHit>, RagError> {
    if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
        return Err(RagError::invalid(SERVICE, errors.to_string()));
    }

    let objects = body
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(collection))
        .and_then(Value::as_array)
        .ok_or_else(|| RagError::invalid(SERVICE, format!("no results for collection {}", collection)))?;

    Ok(objects
        .iter()
        .map(|o| SearchHit {
            chunk: DocumentChunk {
                text: o.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
                title: o.get("title").and_then(Value::as_str).unwrap_or("Unknown").to_string(),
                metadata: ChunkMetadata {
                    source: o.get("source").and_then(Value::as_str).unwrap_or("unknown").to_string(),
                    page: o.get("page").and_then(Value::as_u64).unwrap_or(1) as u32,
                },
            },
            distance: o.pointer("/_additional/distance").and_then(Value::as_f64),
        })
        .collect())
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn insert(&self, chunks: &[DocumentChunk], vectors: &[Embedding]) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let body = self.post("v1/batch/objects", &self.batch_request(chunks, vectors)).await?;
        let stored = parse_batch(&body)?;
        tracing::info!("Stored {}/{} chunks in {}", stored, chunks.len(), self.collection);
        Ok(stored)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, RagError> {
        let body = self.post("v1/graphql", &self.search_request(vector, limit)).await?;
        parse_search(&body, &self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn store(url: Option<&str>) -> WeaviateStore {
        let mut config = AppConfig::from_env().rag;
        config.weaviate_url = url.map(String::from);
        config.weaviate_collection = "Books".to_string();
        WeaviateStore::from_config(reqwest::Client::new(), &config)
    }

    #[test]
    fn endpoint_joins_base_url() {
        let url = store(Some("https://cluster.weaviate.cloud/")).endpoint("v1/graphql").unwrap();
        assert_eq!(url.as_str(), "https://cluster.weaviate.cloud/v1/graphql");
        assert!(matches!(store(None).endpoint("v1/graphql"), Err(RagError::NotConfigured("WEAVIATE_URL"))));
    }

    #[test]
    fn search_query_targets_collection() {
        let body = store(Some("http://localhost:8080")).search_request(&[0.5, 0.25], 15);
        let query = body["query"].as_str().unwrap();
        assert!(query.contains("Books(nearVector: {vector: [0.5,0.25]}, limit: 15)"));
        assert!(query.contains("_additional { distance }"));
    }

    #[test]
    fn batch_objects_carry_properties_and_vector() {
        let chunk = DocumentChunk {
            text: "t".into(),
            title: "Guide".into(),
            metadata: ChunkMetadata { source: "guide.md".into(), page: 4 },
        };
        let body = store(None).batch_request(&[chunk], &[vec![1.0]]);
        assert_eq!(body["objects"][0]["class"], "Books");
        assert_eq!(body["objects"][0]["properties"]["page"], 4);
        assert_eq!(body["objects"][0]["vector"], json!([1.0]));
    }

    #[test]
    fn search_results_fill_defaults() {
        let body = json!({ "data": { "Get": { "Books": [
            { "text": "hello", "title": null, "source": "a.md", "page": 2, "_additional": { "distance": 0.12 } }
        ]}}});
        let hits = parse_search(&body, "Books").unwrap();
        assert_eq!(hits[0].chunk.title, "Unknown");
        assert_eq!(hits[0].chunk.metadata.page, 2);
        assert_eq!(hits[0].distance, Some(0.12));
    }

    #[test]
    fn graphql_errors_surface() {
        let body = json!({ "errors": [{ "message": "class Books not found" }] });
        assert!(matches!(parse_search(&body, "Books"), Err(RagError::InvalidResponse { .. })));
    }

    #[test]
    fn batch_counts_only_clean_objects() {
        let body = json!([
            { "result": {} },
            { "result": { "errors": { "error": [{ "message": "bad vector" }] } } }
        ]);
        assert_eq!(parse_batch(&body).unwrap(), 1);
    }
}
