//! Question-to-segment retrieval over the startup index.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::embedder::Embedder;
use crate::error::Result;
use crate::vector_index::{ScoredSegment, VectorIndex};

/// Embeds questions and looks up their nearest segments.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    embedding_cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl Retriever {
    /// Builds a retriever; `cache_size` of zero disables the question cache.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, cache_size: usize) -> Self {
        Self {
            embedder,
            index,
            embedding_cache: NonZeroUsize::new(cache_size).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Index queried by this retriever.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Returns the `k` most similar segments, best first.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredSegment>> {
        let embedding = self.embed_question(question).await?;
        self.index.search(&embedding, k)
    }

    /// Same as [`Retriever::retrieve`] but only the segment texts.
    pub async fn retrieve_texts(&self, question: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve(question, k)
            .await?
            .into_iter()
            .map(|hit| hit.segment.text)
            .collect())
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.embedding_cache {
            if let Some(hit) = cache.lock().await.get(question).cloned() {
                return Ok(hit);
            }
        }

        let embedding = self.embedder.embed(question).await?;

        if let Some(cache) = &self.embedding_cache {
            cache
                .lock()
                .await
                .put(question.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}
