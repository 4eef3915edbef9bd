use std::time::Duration;

use async_trait::async_trait;
use herald_core::{HeraldError, Result};
use tracing::info;

use crate::provider::*;

/// OpenAI-compatible chat completions provider (OpenAI, Azure, vLLM, Ollama's
/// OpenAI endpoint, etc.)
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::LlmProvider(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
        })
    }

    /// Use a custom base URL (for Azure, Together, vLLM, etc.)
    pub fn with_base_url(mut self, url: impl Into<String>, name: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self.provider_name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Map a reqwest transport error onto the retryable/non-retryable split.
fn classify_transport(e: reqwest::Error) -> HeraldError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        HeraldError::LlmTransient(e.to_string())
    } else {
        HeraldError::LlmProvider(e.to_string())
    }
}

/// 429 and 5xx are worth another attempt; other statuses are not.
pub(crate) fn classify_status(status: u16, body: &str) -> HeraldError {
    let msg = format!("HTTP {status}: {body}");
    if status == 429 || (500..600).contains(&status) {
        HeraldError::LlmTransient(msg)
    } else {
        HeraldError::LlmProvider(msg)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = serde_json::json!({
            "model": &request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": &request.messages,
        });

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = builder.send().await.map_err(classify_transport)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let data: serde_json::Value = resp.json().await.map_err(classify_transport)?;

        let choice = &data["choices"][0];
        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = Usage {
            input_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        info!(
            provider = %self.provider_name,
            model = %request.model,
            tokens = usage.total_tokens(),
            "completion received"
        );

        Ok(LlmResponse {
            text,
            usage,
            stop_reason: match choice["finish_reason"].as_str().unwrap_or("") {
                "length" => StopReason::MaxTokens,
                "content_filter" => StopReason::ContentFilter,
                _ => StopReason::EndTurn,
            },
        })
    }

    async fn health_check(&self) -> Result<()> {
        let mut builder = self.client.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let resp = builder.send().await.map_err(classify_transport)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(classify_status(resp.status().as_u16(), "health check failed"))
        }
    }
}
