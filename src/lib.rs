//! Retrieval-augmented question answering over a single policy document.
//!
//! The document is chunked, embedded, and indexed once at startup; batches of
//! questions are then answered concurrently against the read-only index.

pub mod answerer;
pub mod chunker;
pub mod document;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod generator;
pub mod retriever;
pub mod retry;
pub mod server;
pub mod settings;
pub mod vector_index;

pub use answerer::{Answerer, FALLBACK_ANSWER};
pub use chunker::{chunk_document, chunk_text, ChunkerConfig, Segment};
pub use document::{Document, Page};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use engine::{BatchError, QaEngine, Service};
pub use error::{ErrorClass, RagError, Result};
pub use generator::{AnthropicGenerator, GenerationRequest, Generator, OpenAiGenerator};
pub use retriever::Retriever;
pub use retry::{invoke_with_retry, RetryDecision, RetryPolicy, RetryState};
pub use server::{router, QueryRequest, QueryResponse};
pub use settings::{PipelineArgs, PipelineSettings, ProviderArgs};
pub use vector_index::{ScoredSegment, VectorIndex};
