// In-memory stand-ins for the document-QA backends, shared by unit and
// integration tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::rag::{
    AnswerGenerator, ChunkMetadata, DocumentChunk, DocumentLoader, Embedder, Embedding, LoadedFolder, RagError,
    RagPipeline, RerankResult, Reranker, SearchHit, VectorStore,
};

pub const FAKE_ANSWER: &str = "generated answer";

pub fn chunk(text: &str, source: &str, page: u32) -> DocumentChunk {
    DocumentChunk {
        text: text.to_string(),
        title: source.split('.').next().unwrap_or(source).to_string(),
        metadata: ChunkMetadata {
            source: source.to_string(),
            page,
        },
    }
}

/// Serves the same chunks for any folder; `missing` always reports not found
#[derive(Default)]
pub struct FakeLoader {
    chunks: Vec<DocumentChunk>,
}

impl FakeLoader {
    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl DocumentLoader for FakeLoader {
    async fn load(&self, folder: &str) -> Result<LoadedFolder, RagError> {
        if folder == "missing" {
            return Err(RagError::FolderNotFound(folder.to_string()));
        }

        let mut files: Vec<String> = Vec::new();
        for c in &self.chunks {
            if !files.contains(&c.metadata.source) {
                files.push(c.metadata.source.clone());
            }
        }
        Ok(LoadedFolder {
            files,
            chunks: self.chunks.clone(),
        })
    }
}

/// Two-dimensional vectors derived from text length
#[derive(Default)]
pub struct FakeEmbedder {
    batches: Mutex<Vec<usize>>,
}

impl FakeEmbedder {
    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes = self.batches.lock().map(|b| b.clone()).unwrap_or_default();
        // batches may run concurrently
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, RagError> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(texts.len());
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

/// Returns stored chunks in insertion order
#[derive(Default)]
pub struct FakeVectorStore {
    stored: Mutex<Vec<DocumentChunk>>,
    last_limit: Mutex<Option<usize>>,
}

impl FakeVectorStore {
    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Self {
        Self {
            stored: Mutex::new(chunks),
            last_limit: Mutex::new(None),
        }
    }

    pub fn last_search_limit(&self) -> Option<usize> {
        self.last_limit.lock().ok().and_then(|l| *l)
    }

    pub fn len(&self) -> usize {
        self.stored.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn insert(&self, chunks: &[DocumentChunk], _vectors: &[Embedding]) -> Result<usize, RagError> {
        if let Ok(mut stored) = self.stored.lock() {
            stored.extend_from_slice(chunks);
        }
        Ok(chunks.len())
    }

    async fn search(&self, _vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, RagError> {
        if let Ok(mut last) = self.last_limit.lock() {
            *last = Some(limit);
        }
        let stored = self.stored.lock().map(|s| s.clone()).unwrap_or_default();
        Ok(stored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, chunk)| SearchHit {
                chunk,
                distance: Some(0.1 * (i as f64 + 1.0)),
            })
            .collect())
    }
}

/// Keeps search order, scoring from 1.0 downwards
pub struct FakeReranker;

#[async_trait]
impl Reranker for FakeReranker {
    async fn rerank(&self, _query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankResult>, RagError> {
        Ok((0..documents.len().min(top_n))
            .map(|index| RerankResult {
                index,
                relevance_score: 1.0 - index as f64 * 0.1,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, RagError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user.to_string());
        }
        Ok(FAKE_ANSWER.to_string())
    }
}

/// Pipeline wired entirely to fakes, seeded with `chunks` for ingestion
pub fn fake_pipeline(chunks: Vec<DocumentChunk>) -> RagPipeline {
    RagPipeline::new(
        Arc::new(FakeLoader::with_chunks(chunks)),
        Arc::new(FakeEmbedder::default()),
        Arc::new(FakeVectorStore::default()),
        Arc::new(FakeReranker),
        Arc::new(FakeGenerator::default()),
        100,
    )
}
