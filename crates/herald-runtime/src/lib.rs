//! # herald-runtime
//!
//! Roles, triggers and the subscription runner that binds them.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────┐  Message   ┌──────────────────────────┐  Message  ┌──────────┐
//!   │ Trigger  │ ─────────▶ │ Role                     │ ────────▶ │ Callback │
//!   │ cron /   │            │  1. Perceive (memory)    │           └──────────┘
//!   │ interval │            │  2. Think (route cause)  │
//!   │ channel  │            │  3. Act (capability)     │
//!   └──────────┘            └──────────────────────────┘
//!          └──────── one tokio task per subscription ────────┘
//!                         SubscriptionRunner
//! ```
//!
//! A [`Team`] wires the preset roles into the subscription pipeline: a user
//! requirement is parsed, crawler code is written for it, and the resulting
//! [`SynthesizedCrawl`] is subscribed to its cron schedule. Generated code
//! only ever runs through a [`CodeSandbox`].

pub mod action;
pub mod actions;
pub mod parse;
pub mod prompts;
pub mod role;
pub mod roles;
pub mod sandbox;
pub mod subscription;
pub mod synthesis;
pub mod team;
pub mod trigger;

pub use action::{Action, ActionContext, ActionOutput};
pub use role::{Role, RoleBuilder, Routing};
pub use sandbox::{CodeSandbox, ProcessSandbox};
pub use subscription::{
    ChannelCallback, FailurePolicy, LogCallback, RunnerOptions, SubscriptionCallback,
    SubscriptionInfo, SubscriptionRunner, from_fn,
};
pub use synthesis::{BoundParser, CrawlCapabilities, SynthesizedCrawl, split_segments, synthesize};
pub use team::Team;
pub use trigger::{ChannelTrigger, CronTrigger, IntervalTrigger, ScheduleTz, Trigger};
