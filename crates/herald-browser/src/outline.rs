//! Light-weight HTML digestion: visible text, title, links, and a tag outline.
//!
//! Text goes through `html2text`. The outline is not a parse: it walks tags
//! with a regex, which is enough to show a model what a page is shaped like;
//! generated parsers get the raw HTML and do the real parsing themselves.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// One element of a page outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub depth: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Text directly inside the element, before its first child tag.
    #[serde(default)]
    pub text: String,
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)([^>]*?)(/?)>").expect("valid tag regex")
});
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid class regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static INVISIBLE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let mut res = vec![Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex")];
    // No backreferences in `regex`, so each block element gets its own pattern.
    for tag in ["script", "style", "noscript", "template", "title", "head", "footer"] {
        res.push(
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("valid invisible-block regex"),
        );
    }
    res
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid href regex")
});
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const SKIPPED_TAGS: &[&str] = &["script", "style", "svg", "img", "video", "audio", "noscript"];

/// Maximum characters of text kept per outline node.
const NODE_TEXT_LIMIT: usize = 80;

/// Wrap width handed to html2text. Lines are squashed afterwards, so this
/// only needs to be wide enough not to split words.
const TEXT_WIDTH: usize = 200;

/// Render an HTML fragment as plain text with entities decoded.
fn to_text(fragment: &str) -> String {
    match html2text::from_read(fragment.as_bytes(), TEXT_WIDTH) {
        Ok(text) => squash(&text),
        Err(_) => squash(&ANY_TAG_RE.replace_all(fragment, " ")),
    }
}

fn strip_invisible(html: &str, replacement: &str) -> String {
    INVISIBLE_RES.iter().fold(html.to_string(), |acc, re| {
        re.replace_all(&acc, replacement).into_owned()
    })
}

fn squash(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Contents of the `<title>` element, if any.
pub fn title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| to_text(m.as_str()))
        .unwrap_or_default()
}

/// The text a reader would see: no scripts, styles, head, or footer.
pub fn visible_text(html: &str) -> String {
    to_text(&strip_invisible(html, " "))
}

/// Every `<a href>` on the page, resolved against `base`.
///
/// Relative links are joined onto `base`; absolute links are kept only when
/// they are http(s). Fragments, `mailto:`, `javascript:` and the like are
/// dropped, as are relative links when `base` itself is not a valid URL.
pub fn links(html: &str, base: &str) -> Vec<String> {
    let base = Url::parse(base).ok();
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
            let href = raw.as_str().trim().replace("&amp;", "&");
            match Url::parse(&href) {
                Ok(absolute) => {
                    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
                }
                Err(url::ParseError::RelativeUrlWithoutBase) => {
                    let path = href.split(['?', '#']).next().unwrap_or_default();
                    if path.is_empty() {
                        return None;
                    }
                    base.as_ref()?.join(&href).ok().map(|u| u.to_string())
                }
                Err(_) => None,
            }
        })
        .collect()
}

/// Build a depth-annotated outline of the page's elements, capped at `max_nodes`.
pub fn outline(html: &str, max_nodes: usize) -> Vec<OutlineNode> {
    let cleaned = strip_invisible(html, "");
    let mut nodes = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    // Depth at which a skipped subtree began; nothing is emitted until it closes.
    let mut skipping: Option<usize> = None;

    let tags: Vec<regex::Captures<'_>> = TAG_RE.captures_iter(&cleaned).collect();
    for (i, caps) in tags.iter().enumerate() {
        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let attrs = &caps[3];
        let self_closing = !caps[4].is_empty() || VOID_TAGS.contains(&name.as_str());

        if closing {
            if let Some(pos) = stack.iter().rposition(|open| *open == name) {
                stack.truncate(pos);
                if skipping.is_some_and(|depth| stack.len() <= depth) {
                    skipping = None;
                }
            }
            continue;
        }

        let depth = stack.len();
        if skipping.is_none() && SKIPPED_TAGS.contains(&name.as_str()) {
            if !self_closing {
                skipping = Some(depth);
                stack.push(name);
            }
            continue;
        }

        if skipping.is_none() && nodes.len() < max_nodes {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let text_end = tags
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(cleaned.len(), |m| m.start());
            let text: String = to_text(&cleaned[whole.end..text_end])
                .chars()
                .take(NODE_TEXT_LIMIT)
                .collect();
            let classes = CLASS_RE
                .captures(attrs)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            nodes.push(OutlineNode {
                depth,
                name: name.clone(),
                classes,
                text,
            });
        }

        if !self_closing {
            stack.push(name);
        }
    }

    nodes
}

/// Render an outline one element per line: `<indent>name.class1.class2: text`.
pub fn render(nodes: &[OutlineNode]) -> String {
    nodes
        .iter()
        .map(|n| {
            let mut label = n.name.clone();
            for class in &n.classes {
                label.push('.');
                label.push_str(class);
            }
            format!("{}{}: {}", " ".repeat(n.depth), label, n.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
