use thiserror::Error;

use crate::types::ActionKind;

/// Unified error type for the entire Herald runtime.
#[derive(Error, Debug)]
pub enum HeraldError {
    // ── Trigger errors ─────────────────────────────────────────
    #[error("trigger error: {0}")]
    Trigger(String),

    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    // ── Role errors ────────────────────────────────────────────
    #[error("invalid role '{name}': {reason}")]
    InvalidRole { name: String, reason: String },

    // ── Action errors ──────────────────────────────────────────
    #[error("action failed: {action}: {reason}")]
    Action { action: ActionKind, reason: String },

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    // ── Capability errors ──────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    /// Connection-level failure; the caller may retry.
    #[error("llm provider unavailable: {0}")]
    LlmTransient(String),

    #[error("fetch failed: {url}: {reason}")]
    Fetch { url: String, reason: String },

    // ── Synthesis errors ───────────────────────────────────────
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("generated code has no segment marker for {url}")]
    MissingMarker { url: String },

    #[error("sandbox error: {0}")]
    Sandbox(String),

    // ── Subscription errors ────────────────────────────────────
    #[error("callback error: {0}")]
    Callback(String),

    #[error("role already subscribed: {0}")]
    AlreadySubscribed(String),

    #[error("role not subscribed: {0}")]
    NotSubscribed(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl HeraldError {
    /// Shorthand for an [`HeraldError::Action`].
    pub fn action(action: ActionKind, reason: impl Into<String>) -> Self {
        Self::Action {
            action,
            reason: reason.into(),
        }
    }

    /// Whether the failure is transient and the same call may succeed if retried.
    ///
    /// Herald itself never retries; this is exposed for callers that do.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LlmTransient(_) | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
