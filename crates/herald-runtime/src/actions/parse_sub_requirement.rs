use async_trait::async_trait;
use herald_core::{ActionKind, HeraldError, Result};
use herald_llm::LlmClient;
use serde_json::Value;
use tracing::debug;

use crate::action::{Action, ActionContext, ActionOutput};
use crate::parse::extract_json_object;
use crate::prompts::{self, KEY_CRON, KEY_URLS, SUB_REQUIREMENT_KEYS};

/// Turns free-form subscription requirements into a structured request.
///
/// The reply must be a JSON object carrying every key of
/// [`SUB_REQUIREMENT_KEYS`]; it becomes the output's instruct content.
pub struct ParseSubRequirement {
    llm: LlmClient,
}

impl ParseSubRequirement {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Action for ParseSubRequirement {
    fn kind(&self) -> ActionKind {
        ActionKind::ParseSubRequirement
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutput> {
        let requirements: Vec<&str> = ctx
            .memory
            .get_by_cause(ActionKind::UserRequirement)
            .into_iter()
            .map(|m| m.content())
            .filter(|c| !c.trim().is_empty())
            .collect();
        if requirements.is_empty() {
            return Err(HeraldError::action(self.kind(), "no user requirement to parse"));
        }

        let reply = self
            .llm
            .ask_as(&ctx.system_prompt(), &prompts::parse_sub_requirement(&requirements.join("\n")))
            .await?;
        let parsed = extract_json_object(&reply)
            .ok_or_else(|| HeraldError::action(self.kind(), "reply contains no JSON object"))?;

        let missing: Vec<&str> = SUB_REQUIREMENT_KEYS
            .into_iter()
            .filter(|key| !parsed.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(HeraldError::action(
                self.kind(),
                format!("reply is missing {}", missing.join(", ")),
            ));
        }
        if !parsed.get(KEY_URLS).is_some_and(Value::is_array) {
            return Err(HeraldError::action(self.kind(), format!("'{KEY_URLS}' is not a list")));
        }
        if !parsed.get(KEY_CRON).is_some_and(Value::is_string) {
            return Err(HeraldError::action(self.kind(), format!("'{KEY_CRON}' is not a string")));
        }

        debug!(keys = parsed.len(), "parsed subscription requirement");
        let content = serde_json::to_string_pretty(&parsed)?;
        Ok(ActionOutput::structured(content, parsed))
    }
}
