//! # herald-llm
//!
//! The language-model capability. Roles never talk to a backend directly: they
//! hold an [`LlmClient`], which binds a provider to a model and applies the
//! completion timeout.

pub mod client;
pub mod mock;
pub mod openai;
pub mod provider;

pub use client::LlmClient;
pub use mock::{MockProvider, MockResponse};
pub use openai::OpenAiProvider;
pub use provider::{ChatMessage, ChatRole, LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
