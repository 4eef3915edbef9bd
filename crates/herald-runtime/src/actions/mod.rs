//! Concrete actions of the subscription pipeline.
//!
//! A user requirement flows through them in order: it is parsed into a
//! structured request, per-URL crawler code is written for it, and the
//! resulting crawl is bound to a cron schedule on the shared runner.

mod parse_sub_requirement;
mod run_subscription;
mod write_crawler_code;

pub use parse_sub_requirement::ParseSubRequirement;
pub use run_subscription::RunSubscription;
pub use write_crawler_code::WriteCrawlerCode;
