//! Grounded answer generation from retrieved context.

use std::sync::Arc;

use crate::error::Result;
use crate::generator::{GenerationRequest, Generator};

/// Returned verbatim when the context does not contain the answer.
pub const FALLBACK_ANSWER: &str = "Information not found in the provided documents.";

/// Answers are generated without sampling randomness.
pub const ANSWER_TEMPERATURE: f32 = 0.0;

/// Turns a question plus retrieved context into a single-paragraph answer.
pub struct Answerer {
    generator: Arc<dyn Generator>,
    max_tokens: usize,
}

impl Answerer {
    pub fn new(generator: Arc<dyn Generator>, max_tokens: usize) -> Self {
        Self {
            generator,
            max_tokens: max_tokens.max(1),
        }
    }

    /// Answers `question` strictly from `context`.
    ///
    /// A non-empty completion is returned as-is; an empty or missing one
    /// becomes [`FALLBACK_ANSWER`].
    pub async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        if context.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }
        let prompt = build_prompt(question, context);
        let request = GenerationRequest {
            prompt: &prompt,
            temperature: ANSWER_TEMPERATURE,
            max_tokens: self.max_tokens,
        };
        let answer = self.generator.generate(&request).await?;
        Ok(answer.unwrap_or_else(|| FALLBACK_ANSWER.to_string()))
    }
}

/// Renders the retrieved segments as one context block.
pub fn render_context(context: &[String]) -> String {
    context
        .iter()
        .map(|text| text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the strict policy-expert prompt.
pub fn build_prompt(question: &str, context: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are a strict insurance policy expert.\n");
    prompt.push_str(
        "Extract exact clauses, limits, waiting periods, or exclusions from the context below.\n",
    );
    prompt.push_str("Use only facts stated in the context. Do not guess or explain anything not present.\n");
    prompt.push_str("Respond in a single paragraph.\n");
    prompt.push_str(&format!(
        "If the information is not in the context, reply exactly: \"{FALLBACK_ANSWER}\"\n\n"
    ));
    prompt.push_str("Context:\n");
    prompt.push_str(&render_context(context));
    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(question.trim());
    prompt.push_str("\n\nAnswer:\n");
    prompt
}
