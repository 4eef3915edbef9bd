use serde::{Deserialize, Serialize};

use crate::outline::{self, OutlineNode};

/// Upper bound on outline nodes recorded per page.
pub const MAX_OUTLINE_NODES: usize = 2_000;

/// A fetched page, digested for both models and generated parsers.
///
/// A page that could not be fetched is still a `WebPage`: its `error` is set
/// and its content fields are empty. Callers that fan out over many URLs keep
/// going and let the model see which sources were unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    /// Visible text with scripts, styles, and chrome stripped.
    pub inner_text: String,
    pub html: String,
    /// Absolute http(s) links found on the page, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outline: Vec<OutlineNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebPage {
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let html = html.into();
        Self {
            title: outline::title(&html),
            inner_text: outline::visible_text(&html),
            links: outline::links(&html, &url),
            outline: outline::outline(&html, MAX_OUTLINE_NODES),
            url,
            html,
            error: None,
        }
    }

    pub fn degraded(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            inner_text: String::new(),
            html: String::new(),
            links: Vec::new(),
            outline: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// The outline as indented `name.class: text` lines.
    pub fn render_outline(&self) -> String {
        outline::render(&self.outline)
    }

    /// The JSON handed to a generated parser on stdin.
    pub fn parser_input(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "title": self.title,
            "html": self.html,
            "text": self.inner_text,
            "links": self.links,
        })
    }
}
