//! # Generated-action synthesis
//!
//! Turns a blob of generated parser code, one segment per URL delimited by
//! `# <url>` marker lines, into a [`SynthesizedCrawl`] action. Each segment is
//! bound to its URL under a fresh namespace and only ever executed through a
//! [`CodeSandbox`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use herald_browser::Fetcher;
use herald_core::{ActionKind, HeraldError, Result};
use herald_llm::LlmClient;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::action::{Action, ActionContext, ActionOutput};
use crate::prompts;
use crate::sandbox::CodeSandbox;

/// One URL's parser source, isolated under its own namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundParser {
    pub url: String,
    pub namespace: String,
    pub source: String,
}

/// What a synthesized crawl needs from the outside world.
#[derive(Clone)]
pub struct CrawlCapabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub llm: LlmClient,
    pub sandbox: Arc<dyn CodeSandbox>,
}

/// Cut `blob` into one source segment per URL, returned in `urls` order.
///
/// Each URL's marker is the last `# <url>` in the blob that is followed by
/// whitespace or the end of the text. Markers may appear in any order. Two
/// layouts are understood:
///
/// - marker first (`# a.com\n<code-a>\n# b.com\n<code-b>`), the usual one;
/// - marker last (`<code-a># a.com\n<code-b># b.com`), recognised when there is
///   text before the first marker and nothing after the last one.
pub fn split_segments(urls: &[String], blob: &str) -> Result<Vec<(String, String)>> {
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    // (marker start, marker end, index into urls)
    let mut markers: Vec<(usize, usize, usize)> = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let marker = format!("# {url}");
        let found = blob.rmatch_indices(marker.as_str()).find(|(pos, _)| {
            blob[pos + marker.len()..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace)
        });
        let Some((start, _)) = found else {
            return Err(HeraldError::MissingMarker { url: url.clone() });
        };
        if markers.iter().any(|&(s, _, _)| s == start) {
            return Err(HeraldError::Synthesis(format!("duplicate url in list: {url}")));
        }
        markers.push((start, start + marker.len(), index));
    }
    markers.sort_by_key(|&(start, _, _)| start);

    let first_start = markers[0].0;
    let last_end = markers[markers.len() - 1].1;
    let marker_last = !blob[..first_start].trim().is_empty() && blob[last_end..].trim().is_empty();

    let mut segments = vec![String::new(); urls.len()];
    // Cut from the last marker back to the first so each cut takes exactly one segment.
    let mut end = blob.len();
    for k in (0..markers.len()).rev() {
        let (start, stop, index) = markers[k];
        let raw = if marker_last {
            let begin = if k == 0 { 0 } else { markers[k - 1].1 };
            &blob[begin..start]
        } else {
            &blob[stop..end]
        };
        end = start;

        let source = raw.trim_end().trim_start_matches(['\n', '\r']);
        if source.trim().is_empty() {
            return Err(HeraldError::Synthesis(format!(
                "empty code segment for {}",
                urls[index]
            )));
        }
        segments[index] = source.to_string();
    }

    Ok(urls.iter().cloned().zip(segments).collect())
}

/// Bind every URL's segment of `blob` into a crawl action.
pub fn synthesize(
    urls: &[String],
    blob: &str,
    process: &str,
    caps: CrawlCapabilities,
) -> Result<SynthesizedCrawl> {
    if urls.is_empty() {
        return Err(HeraldError::Synthesis("no urls to crawl".into()));
    }
    let parsers: Vec<BoundParser> = split_segments(urls, blob)?
        .into_iter()
        .map(|(url, source)| BoundParser {
            url,
            namespace: Uuid::new_v4().simple().to_string(),
            source,
        })
        .collect();

    for p in &parsers {
        debug!(url = %p.url, namespace = %p.namespace, bytes = p.source.len(), "bound parser");
    }
    info!(urls = parsers.len(), "synthesized crawl action");

    Ok(SynthesizedCrawl {
        parsers,
        process: process.to_string(),
        caps,
    })
}

/// Fetches every URL, runs each URL's generated parser on its page, and asks
/// the model to answer the post-processing instruction over the results.
pub struct SynthesizedCrawl {
    parsers: Vec<BoundParser>,
    process: String,
    caps: CrawlCapabilities,
}

impl SynthesizedCrawl {
    pub fn parsers(&self) -> &[BoundParser] {
        &self.parsers
    }

    pub fn urls(&self) -> Vec<String> {
        self.parsers.iter().map(|p| p.url.clone()).collect()
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    /// Parser results in URL order. Pages that could not be fetched are
    /// reported as `{"url", "error"}` instead of being parsed.
    pub async fn crawl(&self) -> Result<Vec<Value>> {
        let urls = self.urls();
        let pages = self.caps.fetcher.fetch_all(&urls).await;

        let runs = self.parsers.iter().zip(&pages).map(|(parser, page)| async move {
            match &page.error {
                Some(error) => Ok(serde_json::json!({ "url": page.url, "error": error })),
                None => self.caps.sandbox.execute(parser, page).await,
            }
        });
        try_join_all(runs).await
    }
}

#[async_trait]
impl Action for SynthesizedCrawl {
    fn kind(&self) -> ActionKind {
        ActionKind::SubAction
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutput> {
        let data = self.crawl().await?;
        let prompt = prompts::sub_action(&self.process, &data);
        let answer = self.caps.llm.ask_as(&ctx.system_prompt(), &prompt).await?;
        Ok(ActionOutput::text(answer))
    }
}
