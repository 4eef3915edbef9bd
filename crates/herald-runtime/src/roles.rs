//! Preset roles of the subscription pipeline.

use std::sync::Arc;

use herald_browser::Fetcher;
use herald_core::{ActionKind, Result};
use herald_llm::LlmClient;

use crate::actions::{ParseSubRequirement, RunSubscription, WriteCrawlerCode};
use crate::role::Role;
use crate::synthesis::SynthesizedCrawl;

/// Grace, who parses a subscription request and, once crawler code exists
/// for it, puts the crawl on its schedule.
pub fn subscription_assistant(llm: LlmClient, run: RunSubscription) -> Result<Role> {
    Role::builder("Grace", "Subscription Assistant")
        .goal("analyze user subscription requirements to provide personalized subscription services.")
        .constraints("utilize the same language as the User Requirement")
        .action(ParseSubRequirement::new(llm))
        .action(run)
        .watch([ActionKind::UserRequirement, ActionKind::WriteCrawlerCode])
        .route(ActionKind::UserRequirement, 0)
        .route(ActionKind::WriteCrawlerCode, 1)
        .build()
}

/// John, who writes crawler code for each parsed request.
pub fn crawler_engineer(llm: LlmClient, fetcher: Arc<dyn Fetcher>) -> Result<Role> {
    Role::builder("John", "Crawling Engineer")
        .goal("write crawler code that extracts exactly what the subscription asks for.")
        .action(WriteCrawlerCode::new(llm, fetcher))
        .watch([ActionKind::ParseSubRequirement])
        .build()
}

/// The role a synthesized crawl runs in: it acts on every trigger event.
pub fn sub_role(crawl: SynthesizedCrawl) -> Result<Role> {
    Role::builder("SubRole", "Subscription Crawler")
        .goal("deliver the subscribed content every time the schedule fires.")
        .action(crawl)
        .watch([ActionKind::UserRequirement])
        .build()
}
