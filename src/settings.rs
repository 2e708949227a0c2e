//! Pipeline constants and the command-line/env configuration surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Args;

use crate::chunker::ChunkerConfig;
use crate::embedder::{Embedder, OpenAiEmbedder};
use crate::generator::{AnthropicGenerator, Generator, OpenAiGenerator};
use crate::retry::RetryPolicy;

/// Tunable knobs for indexing and answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Segment length and overlap.
    pub chunker: ChunkerConfig,
    /// Segments retrieved per question.
    pub top_k: usize,
    /// Retry budget for quota errors.
    pub retry: RetryPolicy,
    /// Completion token cap for answers.
    pub max_completion_tokens: usize,
    /// Cached question embeddings (0 disables caching).
    pub embedding_cache_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            top_k: 4,
            retry: RetryPolicy::default(),
            max_completion_tokens: 512,
            embedding_cache_size: 256,
        }
    }
}

/// Pipeline flags shared by the binaries.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Source policy document (PDF or text with form-feed page breaks)
    #[arg(long, env = "POLICY_DOCUMENT", default_value = "policy.pdf")]
    pub document: PathBuf,

    /// Maximum characters per segment
    #[arg(long, env = "POLICY_CHUNK_CHARS", default_value_t = 500)]
    pub chunk_chars: usize,

    /// Characters shared by consecutive segments
    #[arg(long, env = "POLICY_CHUNK_OVERLAP", default_value_t = 100)]
    pub chunk_overlap: usize,

    /// Segments retrieved per question
    #[arg(long, env = "POLICY_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Attempts per question when the provider reports quota errors
    #[arg(long, env = "POLICY_MAX_ATTEMPTS", default_value_t = 4)]
    pub max_attempts: u32,

    /// Base backoff in milliseconds (doubles every attempt)
    #[arg(long, env = "POLICY_RETRY_BASE_MS", default_value_t = 4_000)]
    pub retry_base_ms: u64,

    /// Maximum tokens requested from the answer model
    #[arg(long, env = "POLICY_MAX_COMPLETION_TOKENS", default_value_t = 512)]
    pub max_completion_tokens: usize,

    /// Max cached question embeddings (0 disables caching)
    #[arg(long, env = "POLICY_EMBEDDING_CACHE", default_value_t = 256)]
    pub embedding_cache_size: usize,
}

impl PipelineArgs {
    /// Converts the parsed flags into `PipelineSettings`.
    pub fn build_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunker: ChunkerConfig {
                max_chars: self.chunk_chars.max(1),
                overlap_chars: self.chunk_overlap,
            },
            top_k: self.top_k.max(1),
            retry: RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_ms)),
            max_completion_tokens: self.max_completion_tokens.max(1),
            embedding_cache_size: self.embedding_cache_size,
        }
    }
}

/// Embedding and generation provider flags.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// OpenAI API key (embeddings, and answers with the openai provider)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "POLICY_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "POLICY_EMBED_MODEL", default_value = "text-embedding-3-small")]
    pub embed_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "POLICY_EMBED_DIMENSIONS")]
    pub embed_dimensions: Option<usize>,

    /// Max inputs per embedding request
    #[arg(long, env = "POLICY_EMBED_BATCH", default_value_t = 32)]
    pub embed_batch: usize,

    /// Answer provider (openai or anthropic)
    #[arg(long, env = "POLICY_LLM_PROVIDER", default_value = "openai")]
    pub llm_provider: String,

    /// OpenAI chat model used for answers
    #[arg(long, env = "POLICY_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Anthropic API key (required when --llm-provider anthropic)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(
        long,
        env = "POLICY_ANTHROPIC_MODEL",
        default_value = "claude-3-5-haiku-latest"
    )]
    pub anthropic_model: String,

    /// Seconds before provider requests time out
    #[arg(long, env = "POLICY_HTTP_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}

impl ProviderArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Builds the embedding client.
    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embedder = OpenAiEmbedder::new(
            &self.openai_api_key,
            &self.openai_base_url,
            self.embed_model.clone(),
            self.embed_dimensions,
            self.timeout(),
            self.embed_batch,
        )?;
        Ok(Arc::new(embedder))
    }

    /// Builds the answer model client selected by `--llm-provider`.
    pub fn build_generator(&self) -> Result<Arc<dyn Generator>> {
        match self.llm_provider.to_lowercase().as_str() {
            "openai" => Ok(Arc::new(OpenAiGenerator::new(
                &self.openai_api_key,
                &self.openai_base_url,
                self.chat_model.clone(),
                self.timeout(),
            )?)),
            "anthropic" => {
                let key = self.anthropic_api_key.as_deref().ok_or_else(|| {
                    anyhow!("ANTHROPIC_API_KEY must be set for the Anthropic provider")
                })?;
                Ok(Arc::new(AnthropicGenerator::new(
                    key,
                    self.anthropic_model.clone(),
                    self.timeout(),
                )?))
            }
            other => bail!(
                "unsupported llm provider '{}'; use openai or anthropic",
                other
            ),
        }
    }
}
