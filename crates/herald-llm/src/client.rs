use std::sync::Arc;
use std::time::Duration;

use herald_core::{HeraldError, Result};
use tracing::{debug, warn};

use crate::provider::{ChatMessage, LlmProvider, LlmRequest};

/// A provider bound to a model and its generation settings.
///
/// This is the handle actions hold. Every completion runs under the client's
/// timeout budget, so a hung provider surfaces as a `Timeout` error instead of
/// stalling the caller.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Option<Duration>,
    system: Option<String>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout: Some(Duration::from_secs(120)),
            system: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-completion timeout. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// System prompt prepended to every `ask`.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete a full conversation and return the reply text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            turns = request.messages.len(),
            "llm completion"
        );

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.complete(&request))
                .await
                .map_err(|_| {
                    warn!(provider = self.provider.name(), secs = limit.as_secs(), "llm completion timed out");
                    HeraldError::Timeout {
                        what: format!("llm completion ({})", self.provider.name()),
                        secs: limit.as_secs(),
                    }
                })??,
            None => self.provider.complete(&request).await?,
        };

        debug!(
            provider = self.provider.name(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "llm completion finished"
        );
        Ok(response.text)
    }

    /// Ask a single question, with the client's system prompt if one is set.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));
        self.complete(messages).await
    }

    /// Ask a single question under an explicit system prompt.
    pub async fn ask_as(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(vec![ChatMessage::system(system), ChatMessage::user(prompt)])
            .await
    }
}
