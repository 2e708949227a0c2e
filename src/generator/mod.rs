//! Text-generation capability consumed by the answerer.

use async_trait::async_trait;

use crate::error::Result;

mod anthropic;
mod openai;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;

/// Implemented by concrete LLM providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates a completion for `request`.
    ///
    /// `Ok(None)` means the provider answered but returned no usable text.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<String>>;
}

/// Request envelope shared by the providers.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
