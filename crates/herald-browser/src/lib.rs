//! # herald-browser
//!
//! The page-fetch capability: turns a URL into a [`WebPage`] carrying raw
//! HTML, visible text, and an element outline.

pub mod fetcher;
pub mod outline;
pub mod page;

pub use fetcher::{DEFAULT_MAX_BYTES, DEFAULT_USER_AGENT, Fetcher, HttpFetcher, StaticFetcher};
pub use outline::OutlineNode;
pub use page::WebPage;
