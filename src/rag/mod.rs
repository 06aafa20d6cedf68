// Document question answering: load, embed, store, search, rerank, generate

pub mod groq;
pub mod jina;
pub mod loader;
pub mod weaviate;

pub use groq::GroqGenerator;
pub use jina::JinaClient;
pub use loader::TextDocumentLoader;
pub use weaviate::WeaviateStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::RagConfig;

/// Answer given when the vector search comes back empty
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the documents to answer your question.";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the provided document context.
Always cite the source document and page number when referencing information.
If the answer cannot be found in the context, say so clearly.
Be concise but thorough.";

/// Candidates fetched per requested chunk before reranking
pub const SEARCH_OVERSAMPLE: usize = 3;

pub const MAX_QUERY_LIMIT: usize = 50;

pub type Embedding = Vec<f32>;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Document folder not found: {0}")]
    FolderNotFound(String),

    #[error("Invalid document folder: {0}")]
    InvalidFolder(String),

    #[error("{service} request failed: {message}")]
    Upstream { service: &'static str, message: String },

    #[error("Unexpected {service} response: {message}")]
    InvalidResponse { service: &'static str, message: String },

    #[error("Failed to read documents: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn status_code(&self) -> u16 {
        match self {
            RagError::NotConfigured(_) => 500,
            RagError::FolderNotFound(_) => 404,
            RagError::InvalidFolder(_) => 400,
            RagError::Upstream { .. } | RagError::InvalidResponse { .. } => 502,
            RagError::Io(_) => 500,
        }
    }

    pub(crate) fn upstream(service: &'static str, err: reqwest::Error) -> Self {
        RagError::Upstream {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(service: &'static str, message: impl Into<String>) -> Self {
        RagError::InvalidResponse {
            service,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub title: String,
    pub metadata: ChunkMetadata,
}

/// Files read from one folder and the chunks cut from them
#[derive(Debug, Clone, Default)]
pub struct LoadedFolder {
    pub files: Vec<String>,
    pub chunks: Vec<DocumentChunk>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: DocumentChunk,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub title: String,
    pub metadata: ChunkMetadata,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub query: String,
    pub answer: String,
    pub chunks: Vec<ScoredChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub folder: String,
    pub files: Vec<String>,
    pub chunks: usize,
}

#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, folder: &str) -> Result<LoadedFolder, RagError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed texts in one request, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RagError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store chunks alongside their vectors; returns how many were accepted
    async fn insert(&self, chunks: &[DocumentChunk], vectors: &[Embedding]) -> Result<usize, RagError>;

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, RagError>;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankResult>, RagError>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, RagError>;
}

/// Render chunks as the context block handed to the generator
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "Document: {}\nSource: {}, Page {}\n{}",
                c.title, c.metadata.source, c.metadata.page, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn build_user_prompt(context: &str, query: &str) -> String {
    format!(
        "Context from documents:\n{}\n\nQuestion: {}\n\nPlease answer the question based on the provided context. Include source citations.",
        context, query
    )
}

/// Reorder search hits by reranker output, dropping indices it made up
fn apply_rerank(hits: &[SearchHit], ranked: &[RerankResult]) -> Vec<ScoredChunk> {
    ranked
        .iter()
        .filter_map(|r| {
            hits.get(r.index).map(|hit| ScoredChunk {
                text: hit.chunk.text.clone(),
                title: hit.chunk.title.clone(),
                metadata: hit.chunk.metadata.clone(),
                score: Some(r.relevance_score).or(hit.distance),
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct RagPipeline {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    generator: Arc<dyn AnswerGenerator>,
    batch_size: usize,
}

impl RagPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        generator: Arc<dyn AnswerGenerator>,
        batch_size: usize,
    ) -> Self {
        Self {
            loader,
            embedder,
            store,
            reranker,
            generator,
            batch_size: batch_size.max(1),
        }
    }

    /// HTTP-backed pipeline. Missing keys surface as `NotConfigured` on first use.
    pub fn from_config(config: &RagConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        let jina = Arc::new(JinaClient::from_config(client.clone(), config));
        Self::new(
            Arc::new(TextDocumentLoader::new(&config.documents_root, config.max_chunk_chars)),
            jina.clone(),
            Arc::new(WeaviateStore::from_config(client.clone(), config)),
            jina,
            Arc::new(GroqGenerator::from_config(client, config)),
            config.embedding_batch_size,
        )
    }

    pub async fn query(&self, query: &str, limit: usize) -> Result<RagAnswer, RagError> {
        tracing::info!("Processing document query ({} chars, limit {})", query.len(), limit);

        let vector = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::invalid("embeddings", "no embedding returned for query"))?;

        let hits = self.store.search(&vector, limit * SEARCH_OVERSAMPLE).await?;
        tracing::debug!("Vector search returned {} candidates", hits.len());

        if hits.is_empty() {
            return Ok(RagAnswer {
                query: query.to_string(),
                answer: NO_RESULTS_ANSWER.to_string(),
                chunks: Vec::new(),
            });
        }

        let texts: Vec<String> = hits.iter().map(|h| h.chunk.text.clone()).collect();
        let ranked = self.reranker.rerank(query, &texts, limit).await?;
        let chunks = apply_rerank(&hits, &ranked);

        let context = build_context(&chunks);
        let answer = self
            .generator
            .generate(SYSTEM_PROMPT, &build_user_prompt(&context, query))
            .await?;

        Ok(RagAnswer {
            query: query.to_string(),
            answer,
            chunks,
        })
    }

    pub async fn ingest(&self, folder: &str) -> Result<IngestReport, RagError> {
        let loaded = self.loader.load(folder).await?;
        tracing::info!(
            "Loaded {} chunks from {} files in '{}'",
            loaded.chunks.len(),
            loaded.files.len(),
            folder
        );

        if loaded.chunks.is_empty() {
            return Ok(IngestReport {
                folder: folder.to_string(),
                files: loaded.files,
                chunks: 0,
            });
        }

        let texts: Vec<String> = loaded.chunks.iter().map(|c| c.text.clone()).collect();
        let batches = futures::future::try_join_all(
            texts.chunks(self.batch_size).map(|batch| self.embedder.embed_batch(batch)),
        )
        .await?;
        let vectors: Vec<Embedding> = batches.into_iter().flatten().collect();

        if vectors.len() != loaded.chunks.len() {
            return Err(RagError::invalid(
                "embeddings",
                format!("expected {} embeddings, got {}", loaded.chunks.len(), vectors.len()),
            ));
        }

        let stored = self.store.insert(&loaded.chunks, &vectors).await?;

        Ok(IngestReport {
            folder: folder.to_string(),
            files: loaded.files,
            chunks: stored,
        })
    }
}
