use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped from `herald.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub llm: LlmConfig,
    pub runner: RunnerConfig,
    pub browser: BrowserConfig,
    pub sandbox: SandboxConfig,
    pub workspace: WorkspaceConfig,
    pub logging: LoggingConfig,
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend: "openai" (any OpenAI-compatible endpoint) or "mock".
    pub provider: String,
    pub model: String,
    /// Override the API base URL, e.g. "http://localhost:11434/v1" for Ollama.
    pub base_url: Option<String>,
    /// Can also be set via OPENAI_API_KEY. Config file takes priority.
    pub api_key: Option<String>,
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Budget for a single completion. 0 = no limit.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            base_url: None,
            api_key: None,
            max_tokens: 4096,
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

// ── Runner ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// What a subscription does when its action or callback fails:
    /// "teardown" removes it, "restart" waits for the next trigger event.
    pub failure_policy: String,
    /// Under "restart", tear down after this many failures in a row.
    pub max_consecutive_failures: u32,
    /// Bound on one perceive/decide/act cycle. 0 = no limit.
    pub cycle_timeout_secs: u64,
    /// Bound on one callback invocation. 0 = no limit.
    pub callback_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            failure_policy: "teardown".into(),
            max_consecutive_failures: 3,
            cycle_timeout_secs: 0,
            callback_timeout_secs: 30,
        }
    }
}

// ── Browser ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Page bodies larger than this are truncated.
    pub max_bytes: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("herald/", env!("CARGO_PKG_VERSION")).into(),
            max_bytes: 2_000_000,
        }
    }
}

// ── Sandbox ────────────────────────────────────────────────────

/// How generated parsers are executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter binary, looked up on PATH.
    pub interpreter: String,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            args: vec!["-I".into()],
            timeout_secs: 60,
            max_output_bytes: 1_000_000,
        }
    }
}

// ── Workspace ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Scratch directories for generated parsers live under this root.
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".herald")
                .join("workspace"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", tag, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl HeraldConfig {
    /// Validate the config and return the list of non-fatal findings.
    ///
    /// Fails with [`herald_core::HeraldError::ConfigValidation`] naming the
    /// first offending field if any finding is an error.
    pub fn validate(&self) -> herald_core::Result<Vec<ConfigWarning>> {
        let mut warnings = Vec::new();

        // ── LLM provider ───
        let valid_providers = ["openai", "mock"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "llm.provider".into(),
                message: format!("unknown provider '{}'", self.llm.provider),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_providers.join(", "))),
            });
        }

        if self.llm.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gpt-4o-mini'".into()),
            });
        }

        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is out of range", self.llm.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        if self.llm.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "llm.max_tokens".into(),
                message: "max_tokens is 0, the model cannot produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4096".into()),
            });
        }

        if self.llm.provider == "openai"
            && self.llm.api_key.is_none()
            && self.llm.base_url.is_none()
        {
            warnings.push(ConfigWarning {
                field: "llm.api_key".into(),
                message: "no API key for the default OpenAI endpoint".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set llm.api_key or OPENAI_API_KEY, or point llm.base_url at a local server".into()),
            });
        }

        if self.llm.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "llm.timeout_secs".into(),
                message: "completions have no time limit".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Runner ───
        let valid_policies = ["teardown", "restart"];
        if !valid_policies.contains(&self.runner.failure_policy.as_str()) {
            warnings.push(ConfigWarning {
                field: "runner.failure_policy".into(),
                message: format!("unknown failure policy '{}'", self.runner.failure_policy),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_policies.join(", "))),
            });
        } else if self.runner.failure_policy == "restart"
            && self.runner.max_consecutive_failures == 0
        {
            warnings.push(ConfigWarning {
                field: "runner.max_consecutive_failures".into(),
                message: "0 means the first failure tears the subscription down".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use failure_policy = \"teardown\" for that behaviour".into()),
            });
        }

        // ── Browser ───
        if self.browser.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "browser.timeout_secs".into(),
                message: "fetch timeout is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 30".into()),
            });
        }

        // ── Sandbox ───
        if self.sandbox.interpreter.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "sandbox.interpreter".into(),
                message: "interpreter is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'python3'".into()),
            });
        }
        if self.sandbox.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "sandbox.timeout_secs".into(),
                message: "parser timeout is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }

        // ── Workspace ───
        if self.workspace.root.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                field: "workspace.root".into(),
                message: "workspace root is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '~/.herald/workspace'".into()),
            });
        } else if self.workspace.root.is_relative() {
            warnings.push(ConfigWarning {
                field: "workspace.root".into(),
                message: format!(
                    "'{}' is relative to the current directory",
                    self.workspace.root.display()
                ),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<&ConfigWarning> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .collect();

        if let Some(first) = errors.first() {
            let reason = errors
                .iter()
                .map(|w| format!("{}: {}", w.field, w.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(herald_core::HeraldError::ConfigValidation {
                field: first.field.clone(),
                reason,
            });
        }

        Ok(warnings)
    }
}
