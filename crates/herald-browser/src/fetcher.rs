//! Page fetchers.
//!
//! [`HttpFetcher`] is the production implementation. [`StaticFetcher`] serves
//! canned HTML and is what tests and offline runs wire in instead.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::join_all;
use herald_core::{HeraldError, Result};
use tracing::{debug, info, warn};

use crate::page::WebPage;

pub const DEFAULT_USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_BYTES: usize = 2_000_000;

/// Fetches a URL and digests it into a [`WebPage`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<WebPage>;

    /// Fetch every URL concurrently. Results keep the order of `urls`; a
    /// failed fetch shows up as a degraded page rather than an error.
    async fn fetch_all(&self, urls: &[String]) -> Vec<WebPage> {
        let pages = join_all(urls.iter().map(|url| self.fetch(url))).await;
        pages
            .into_iter()
            .zip(urls)
            .map(|(result, url)| {
                result.unwrap_or_else(|e| {
                    warn!(url = %url, error = %e, "fetch failed, using degraded page");
                    WebPage::degraded(url.clone(), e.to_string())
                })
            })
            .collect()
    }
}

/// Plain HTTP GET fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| HeraldError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_BYTES,
        })
    }

    /// Stop reading bodies after `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn get(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HeraldError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HeraldError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        // Read one byte past the cap so the cut can see where the next char starts.
        let mut body = Vec::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| HeraldError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            body.extend_from_slice(&chunk);
            if body.len() > self.max_bytes {
                debug!(url = url, max_bytes = self.max_bytes, "body over cap, truncating");
                break;
            }
        }
        Ok(utf8_prefix(&body, self.max_bytes))
    }
}

/// Decode at most `max_bytes` of `bytes`, never splitting a UTF-8 sequence.
fn utf8_prefix(bytes: &[u8], max_bytes: usize) -> String {
    let mut cut = bytes.len().min(max_bytes);
    if cut < bytes.len() {
        while cut > 0 && (bytes[cut] & 0xC0) == 0x80 {
            cut -= 1;
        }
    }
    String::from_utf8_lossy(&bytes[..cut]).into_owned()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<WebPage> {
        info!(url = url, "fetching page");
        match self.get(url).await {
            Ok(html) => {
                debug!(url = url, bytes = html.len(), "page fetched");
                Ok(WebPage::from_html(url, html))
            }
            Err(e) => {
                warn!(url = url, error = %e, "page unavailable");
                Ok(WebPage::degraded(url, e.to_string()))
            }
        }
    }
}

/// Serves pre-registered HTML by URL. Unknown URLs come back degraded.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<WebPage> {
        Ok(match self.pages.get(url) {
            Some(html) => WebPage::from_html(url, html.clone()),
            None => WebPage::degraded(url, "not found"),
        })
    }
}
