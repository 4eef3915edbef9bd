//! The capability a role performs when it decides to act.

use async_trait::async_trait;
use herald_core::{ActionKind, InstructContent, Result};
use herald_memory::Memory;

/// Read-only view of the acting role handed to an [`Action`].
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub memory: &'a Memory,
    pub name: &'a str,
    pub profile: &'a str,
    pub goal: &'a str,
    pub constraints: &'a str,
}

impl ActionContext<'_> {
    /// System prompt introducing the acting role to the model.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are a {}, named {}", self.profile, self.name);
        if !self.goal.is_empty() {
            prompt.push_str(&format!(", your goal is {}", self.goal));
        }
        prompt.push('.');
        if !self.constraints.is_empty() {
            prompt.push_str(&format!(" The constraint is {}.", self.constraints));
        }
        prompt
    }
}

/// What an action produced. The role wraps it into a [`herald_core::Message`]
/// caused by the action's kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    pub content: String,
    pub instruct_content: Option<InstructContent>,
}

impl ActionOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            instruct_content: None,
        }
    }

    pub fn structured(content: impl Into<String>, instruct: InstructContent) -> Self {
        Self {
            content: content.into(),
            instruct_content: Some(instruct),
        }
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    /// The cause stamped on every message this action produces.
    fn kind(&self) -> ActionKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutput>;
}
