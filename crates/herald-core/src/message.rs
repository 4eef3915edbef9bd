use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::ActionKind;

/// Structured payload attached to a message by upstream parsing.
pub type InstructContent = serde_json::Map<String, Value>;

/// A message on the bus.
///
/// Messages are immutable once built: fields are private and the builder
/// methods consume `self`, so anything holding a `&Message` sees a settled value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instruct_content: Option<InstructContent>,
    cause_by: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message caused by [`ActionKind::UserRequirement`].
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            instruct_content: None,
            cause_by: ActionKind::UserRequirement,
            role: None,
            created_at: Utc::now(),
        }
    }

    /// Create a message caused by `cause_by`.
    pub fn caused_by(content: impl Into<String>, cause_by: ActionKind) -> Self {
        Self::new(content).with_cause(cause_by)
    }

    pub fn with_cause(mut self, cause_by: ActionKind) -> Self {
        self.cause_by = cause_by;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_instruct_content(mut self, instruct: InstructContent) -> Self {
        self.instruct_content = Some(instruct);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn instruct_content(&self) -> Option<&InstructContent> {
        self.instruct_content.as_ref()
    }

    pub fn cause_by(&self) -> ActionKind {
        self.cause_by
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Look up a field of the instruct content.
    pub fn instruct_field(&self, key: &str) -> Option<&Value> {
        self.instruct_content.as_ref().and_then(|m| m.get(key))
    }

    /// Read an instruct field as a string.
    pub fn instruct_str(&self, key: &str) -> Option<&str> {
        self.instruct_field(key).and_then(Value::as_str)
    }

    /// Read an instruct field as a list of strings. Non-string entries are skipped.
    pub fn instruct_str_list(&self, key: &str) -> Option<Vec<String>> {
        self.instruct_field(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.role {
            Some(role) => write!(f, "{}: {}", role, self.content),
            None => write!(f, "{}", self.content),
        }
    }
}
