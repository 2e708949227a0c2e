use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{non_empty, GenerationRequest, Generator};
use crate::error::{RagError, Result};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

pub struct AnthropicGenerator {
    model: String,
    client: Client,
}

impl AnthropicGenerator {
    pub fn new(api_key: &str, model: String, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Anthropic API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self { model, client })
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Option<String>> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: request.prompt,
                }],
            }],
        };
        let resp = self.client.post(MESSAGES_URL).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::Upstream {
                provider: "Anthropic",
                status,
                message,
            });
        }
        let parsed: AnthropicResponse = resp.json().await?;
        Ok(joined_text(parsed))
    }
}

fn joined_text(parsed: AnthropicResponse) -> Option<String> {
    let answer = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::Text { text } => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(answer)
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_text_blocks_are_ignored() {
        let parsed: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use"},{"type":"text","text":"Covered."}]}"#,
        )
        .unwrap();
        assert_eq!(joined_text(parsed).as_deref(), Some("Covered."));
    }

    #[test]
    fn empty_content_maps_to_none() {
        let parsed: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert_eq!(joined_text(parsed), None);
    }
}
