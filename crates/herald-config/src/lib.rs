//! # herald-config
//!
//! Configuration system for the Herald runtime. Reads from `herald.toml` and
//! environment variables, in that precedence order; CLI flags win over both.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BrowserConfig, ConfigWarning, HeraldConfig, LlmConfig, LoggingConfig, RunnerConfig,
    SandboxConfig, WarningSeverity, WorkspaceConfig,
};
