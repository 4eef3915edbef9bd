use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use herald_browser::Fetcher;
use herald_core::{ActionKind, HeraldError, Result};
use herald_llm::LlmClient;
use tracing::info;

use crate::action::{Action, ActionContext, ActionOutput};
use crate::parse::extract_code_block;
use crate::prompts::{self, KEY_EXTRACTION, KEY_URLS};

/// Writes one `parse(soup)` function per URL of the latest parsed request.
///
/// Each page is fetched and its outline shown to the model. The replies are
/// joined into a single blob where every URL's code follows a `# <url>` line.
pub struct WriteCrawlerCode {
    llm: LlmClient,
    fetcher: Arc<dyn Fetcher>,
}

impl WriteCrawlerCode {
    pub fn new(llm: LlmClient, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { llm, fetcher }
    }

    async fn write_one(&self, system: &str, url: &str, query: &str) -> Result<String> {
        let page = self.fetcher.fetch(url).await?;
        if let Some(error) = &page.error {
            return Err(HeraldError::action(
                self.kind(),
                format!("cannot outline {url}: {error}"),
            ));
        }
        let prompt = prompts::write_crawler_code(query, &page.render_outline());
        let reply = self.llm.ask_as(system, &prompt).await?;
        Ok(extract_code_block(&reply, "python"))
    }
}

#[async_trait]
impl Action for WriteCrawlerCode {
    fn kind(&self) -> ActionKind {
        ActionKind::WriteCrawlerCode
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutput> {
        let request = ctx
            .memory
            .latest_by_cause(ActionKind::ParseSubRequirement)
            .ok_or_else(|| HeraldError::action(self.kind(), "no parsed requirement in memory"))?;
        let urls = request
            .instruct_str_list(KEY_URLS)
            .filter(|urls| !urls.is_empty())
            .ok_or_else(|| HeraldError::action(self.kind(), "parsed requirement has no urls"))?;
        let query = request.instruct_str(KEY_EXTRACTION).unwrap_or_default();

        let system = ctx.system_prompt();
        let codes = try_join_all(urls.iter().map(|url| self.write_one(&system, url, query))).await?;

        info!(urls = urls.len(), "crawler code written");
        let blob = urls
            .iter()
            .zip(codes)
            .map(|(url, code)| format!("# {url}\n{code}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ActionOutput::text(blob))
    }
}
