use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{ActionKind, HeraldError, InstructContent, Result};
use serde_json::json;
use tracing::info;

use crate::action::{Action, ActionContext, ActionOutput};
use crate::prompts::{KEY_CRON, KEY_PROCESS, KEY_URLS};
use crate::roles;
use crate::subscription::{SubscriptionCallback, SubscriptionRunner};
use crate::synthesis::{CrawlCapabilities, synthesize};
use crate::trigger::{CronTrigger, ScheduleTz};

/// Binds the latest written crawler code to its cron schedule.
///
/// The synthesized crawl is wrapped in a fresh single-capability role and
/// handed to the shared runner, which owns it from then on. The action
/// returns as soon as the subscription is registered.
pub struct RunSubscription {
    runner: SubscriptionRunner,
    caps: CrawlCapabilities,
    callback: Arc<dyn SubscriptionCallback>,
    timezone: ScheduleTz,
}

impl RunSubscription {
    pub fn new(
        runner: SubscriptionRunner,
        caps: CrawlCapabilities,
        callback: Arc<dyn SubscriptionCallback>,
    ) -> Self {
        Self {
            runner,
            caps,
            callback,
            timezone: ScheduleTz::default(),
        }
    }

    pub fn with_timezone(mut self, timezone: ScheduleTz) -> Self {
        self.timezone = timezone;
        self
    }
}

#[async_trait]
impl Action for RunSubscription {
    fn kind(&self) -> ActionKind {
        ActionKind::RunSubscription
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutput> {
        let code = ctx
            .memory
            .latest_by_cause(ActionKind::WriteCrawlerCode)
            .ok_or_else(|| HeraldError::action(self.kind(), "no crawler code in memory"))?;
        let request = ctx
            .memory
            .latest_by_cause(ActionKind::ParseSubRequirement)
            .ok_or_else(|| HeraldError::action(self.kind(), "no parsed requirement in memory"))?;

        let urls = request.instruct_str_list(KEY_URLS).unwrap_or_default();
        let process = request.instruct_str(KEY_PROCESS).unwrap_or_default();
        let cron = request
            .instruct_str(KEY_CRON)
            .ok_or_else(|| HeraldError::action(self.kind(), "parsed requirement has no schedule"))?;

        let crawl = synthesize(&urls, code.content(), process, self.caps.clone())?;
        let trigger = CronTrigger::with_timezone(cron, self.timezone)?;
        let role = roles::sub_role(crawl)?;
        let role_id = role.id();
        let subscription_id =
            self.runner
                .subscribe_boxed(role, Box::new(trigger), Arc::clone(&self.callback))?;

        info!(
            subscription_id = %subscription_id,
            role_id = %role_id,
            cron,
            urls = urls.len(),
            "crawl subscribed"
        );

        let mut instruct = InstructContent::new();
        instruct.insert("subscription_id".into(), json!(subscription_id));
        instruct.insert("role_id".into(), json!(role_id));
        instruct.insert(KEY_CRON.into(), json!(cron));
        instruct.insert(KEY_URLS.into(), json!(urls));
        let content = format!(
            "Subscribed to {} page(s) on schedule '{}' ({}).",
            urls.len(),
            cron,
            self.timezone
        );
        Ok(ActionOutput::structured(content, instruct))
    }
}
