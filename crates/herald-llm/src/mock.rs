//! Mock LLM provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::*;
use herald_core::{HeraldError, Result};

/// A mock LLM provider that returns pre-configured responses.
///
/// # Example
/// ```
/// use herald_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Returned once the queue is empty.
    fallback: Option<MockResponse>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone, Default)]
pub struct MockResponse {
    pub text: String,
    /// If set, the provider will return this error instead.
    pub error: Option<String>,
    /// Report `error` as a transient failure.
    pub transient: bool,
    /// Sleep this long before answering.
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Create a text response.
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// Create a non-retryable error response.
    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    /// Create a transient (retryable) error response.
    pub fn transient(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            transient: true,
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(MockResponse::text(text));
        self
    }

    /// Queue a non-retryable error response.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push_back(MockResponse::error(error));
        self
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Answer with `resp` whenever the queue is empty.
    pub fn with_fallback(mut self, resp: MockResponse) -> Self {
        self.fallback = Some(resp);
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Pop the next queued response, or the fallback, or a "no response queued" text.
    fn next_response(&self) -> MockResponse {
        if let Some(resp) = self.responses.lock().pop_front() {
            return resp;
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| MockResponse::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(delay) = mock.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = mock.error {
            return Err(if mock.transient {
                HeraldError::LlmTransient(error)
            } else {
                HeraldError::LlmProvider(error)
            });
        }

        Ok(LlmResponse {
            usage: Usage {
                input_tokens: 100,
                output_tokens: (mock.text.len() / 4).max(1) as u32,
            },
            text: mock.text,
            stop_reason: StopReason::EndTurn,
        })
    }
}
