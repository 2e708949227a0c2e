//! Embedding capability consumed by the indexer and the retriever.

use async_trait::async_trait;

use crate::error::{RagError, Result};

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Maps text to fixed-length vectors.
///
/// Segments and questions must go through the same implementation so they
/// share one embedding space.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Largest batch accepted by [`Embedder::embed_batch`].
    fn batch_size(&self) -> usize {
        32
    }

    /// Embeds a single text.
    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[input])
            .await?
            .pop()
            .ok_or_else(|| RagError::InvalidResponse {
                provider: "embedder",
                message: "no embedding returned".to_string(),
            })
    }
}
