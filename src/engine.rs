//! Startup indexing, readiness, and concurrent batch answering.

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use log::{error, info};
use thiserror::Error;

use crate::answerer::Answerer;
use crate::chunker::chunk_document;
use crate::document::Document;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::retriever::Retriever;
use crate::retry::invoke_with_retry;
use crate::settings::PipelineSettings;
use crate::vector_index::{ScoredSegment, VectorIndex};

/// Failure of a whole batch request.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("LLM not ready")]
    NotReady,

    #[error("Processing failed: {0}")]
    Failed(#[source] RagError),
}

/// Fully built question-answering pipeline over one document.
pub struct QaEngine {
    retriever: Retriever,
    answerer: Answerer,
    settings: PipelineSettings,
}

impl QaEngine {
    /// Chunks `document`, embeds every segment, and wires retrieval to generation.
    pub async fn build(
        document: &Document,
        settings: PipelineSettings,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let segments = chunk_document(document, &settings.chunker);
        info!(
            "chunked {} ({} pages, {} chars) into {} segments",
            document.source().display(),
            document.pages().len(),
            document.char_len(),
            segments.len()
        );
        let index = VectorIndex::build(segments, embedder.as_ref()).await?;
        info!(
            "indexed {} segments ({} dimensions)",
            index.len(),
            index.dimensions()
        );
        Ok(Self {
            retriever: Retriever::new(embedder, Arc::new(index), settings.embedding_cache_size),
            answerer: Answerer::new(generator, settings.max_completion_tokens),
            settings,
        })
    }

    /// Number of indexed segments.
    pub fn index_len(&self) -> usize {
        self.retriever.index().len()
    }

    /// Top-k segments for `question`, with scores.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredSegment>> {
        self.retriever.retrieve(question, self.settings.top_k).await
    }

    /// One retrieval + answer pass, no retry.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let context = self
            .retriever
            .retrieve_texts(question, self.settings.top_k)
            .await?;
        self.answerer.answer(question, &context).await
    }

    /// [`QaEngine::answer`] wrapped in the quota-aware retry loop.
    pub async fn answer_with_retry(&self, question: &str) -> Result<String> {
        invoke_with_retry(self.settings.retry, move || self.answer(question)).await
    }
}

/// Readiness published once at startup and shared read-only with handlers.
#[derive(Clone)]
pub enum Service {
    Ready(Arc<QaEngine>),
    NotReady { reason: String },
}

impl Service {
    /// Loads and indexes the document at `path`.
    ///
    /// Never fails: any startup error is logged and leaves the service not ready
    /// so liveness checks still work.
    pub async fn initialize(
        path: &Path,
        settings: PipelineSettings,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let document = match Document::load(path).await {
            Ok(document) => document,
            Err(err) => {
                error!("startup aborted: {err}");
                return Service::NotReady {
                    reason: err.to_string(),
                };
            }
        };
        match QaEngine::build(&document, settings, embedder, generator).await {
            Ok(engine) => {
                info!("question answering initialized successfully");
                Service::Ready(Arc::new(engine))
            }
            Err(err) => {
                error!("startup failed while indexing: {err}");
                Service::NotReady {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Service::Ready(_))
    }

    /// Answers every question concurrently, preserving input order.
    ///
    /// No work is dispatched when the service is not ready.
    pub async fn run_batch(
        &self,
        questions: &[String],
    ) -> std::result::Result<Vec<String>, BatchError> {
        let engine = match self {
            Service::Ready(engine) => engine,
            Service::NotReady { .. } => return Err(BatchError::NotReady),
        };
        let results = join_all(
            questions
                .iter()
                .map(|question| engine.answer_with_retry(question)),
        )
        .await;
        collapse_batch(results).map_err(|err| {
            error!("batch of {} questions failed: {err}", questions.len());
            BatchError::Failed(err)
        })
    }
}

/// All-or-nothing policy: the first failure, in input order, fails the batch.
fn collapse_batch(results: Vec<Result<String>>) -> Result<Vec<String>> {
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationRequest;
    use async_trait::async_trait;
    use std::time::Duration;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(inputs
                .iter()
                .map(|text| vec![1.0, text.len() as f32])
                .collect())
        }
    }

    /// Finishes later for earlier questions so completion order is reversed.
    struct SlowFirst;

    #[async_trait]
    impl Generator for SlowFirst {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<String>> {
            let question = request
                .prompt
                .split("Question:\n")
                .nth(1)
                .and_then(|rest| rest.lines().next())
                .unwrap_or_default()
                .to_string();
            let delay = match question.as_str() {
                "Q1" => 30,
                "Q2" => 10,
                _ => 20,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if question == "FAIL" {
                return Err(RagError::InvalidResponse {
                    provider: "test",
                    message: "boom".to_string(),
                });
            }
            Ok(Some(format!("A{}", &question[1..])))
        }
    }

    async fn ready_service() -> Service {
        let document = Document::from_pages("policy.txt", ["Waiting period is two years. ".repeat(40)]);
        let engine = QaEngine::build(
            &document,
            PipelineSettings::default(),
            Arc::new(LengthEmbedder),
            Arc::new(SlowFirst),
        )
        .await
        .expect("engine");
        Service::Ready(Arc::new(engine))
    }

    #[tokio::test(start_paused = true)]
    async fn answers_keep_input_order() {
        let service = ready_service().await;
        let questions: Vec<String> = ["Q1", "Q2", "Q3"].iter().map(|q| q.to_string()).collect();
        let answers = service.run_batch(&questions).await.unwrap();
        assert_eq!(answers, vec!["A1", "A2", "A3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn questions_run_concurrently() {
        let service = ready_service().await;
        let questions: Vec<String> = ["Q1", "Q2", "Q3"].iter().map(|q| q.to_string()).collect();
        let started = tokio::time::Instant::now();
        service.run_batch(&questions).await.unwrap();
        let elapsed = started.elapsed();
        // Slowest question takes 30ms; running them in sequence would take 60ms.
        assert!(elapsed >= Duration::from_millis(30), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(60), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_fails_the_batch() {
        let service = ready_service().await;
        let questions: Vec<String> = ["Q1", "FAIL", "Q3"].iter().map(|q| q.to_string()).collect();
        let err = service.run_batch(&questions).await.unwrap_err();
        assert!(matches!(err, BatchError::Failed(_)));
        assert!(err.to_string().starts_with("Processing failed"));
    }

    #[tokio::test]
    async fn not_ready_rejects_without_work() {
        let service = Service::NotReady {
            reason: "document missing".to_string(),
        };
        let err = service.run_batch(&["Q1".to_string()]).await.unwrap_err();
        assert!(matches!(err, BatchError::NotReady));
    }

    #[tokio::test]
    async fn missing_document_leaves_service_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let service = Service::initialize(
            &dir.path().join("policy.pdf"),
            PipelineSettings::default(),
            Arc::new(LengthEmbedder),
            Arc::new(SlowFirst),
        )
        .await;
        assert!(!service.is_ready());
    }

    #[tokio::test]
    async fn rebuilding_yields_same_index_size() {
        let document = Document::from_pages("policy.txt", ["Room rent capped at 1%. ".repeat(100)]);
        let mut sizes = Vec::new();
        for _ in 0..2 {
            let engine = QaEngine::build(
                &document,
                PipelineSettings::default(),
                Arc::new(LengthEmbedder),
                Arc::new(SlowFirst),
            )
            .await
            .unwrap();
            sizes.push(engine.index_len());
        }
        assert!(sizes[0] > 1);
        assert_eq!(sizes[0], sizes[1]);
    }

    #[test]
    fn collapse_reports_first_error_in_order() {
        let results = vec![
            Ok("a".to_string()),
            Err(RagError::EmptyIndex),
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3,
            }),
        ];
        assert!(matches!(collapse_batch(results), Err(RagError::EmptyIndex)));
    }
}
