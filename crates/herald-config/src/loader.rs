use std::path::{Path, PathBuf};

use herald_core::{HeraldError, Result};
use tracing::{info, warn};

use crate::schema::HeraldConfig;

/// Loads the Herald configuration from disk and the environment.
#[derive(Debug)]
pub struct ConfigLoader {
    config: HeraldConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > HERALD_CONFIG env > ~/.herald/herald.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("HERALD_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".herald")
            .join("herald.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            HeraldConfig::default()
        };

        let config = Self::apply_overrides(config, |key| std::env::var(key).ok());

        // Log warnings, fail on errors
        for w in config.validate()? {
            warn!("{}", w);
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, path: &Path) -> Result<HeraldConfig> {
        toml::from_str::<HeraldConfig>(raw).map_err(|e| {
            HeraldError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn get(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn into_config(self) -> HeraldConfig {
        self.config
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply overrides (HERALD_LLM_MODEL, HERALD_LOG_LEVEL, HERALD_WORKSPACE, OPENAI_API_KEY)
    /// looked up through `lookup`, which is `std::env::var` outside of tests.
    pub fn apply_overrides(
        mut config: HeraldConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> HeraldConfig {
        if let Some(v) = lookup("HERALD_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = lookup("HERALD_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("HERALD_WORKSPACE") {
            config.workspace.root = PathBuf::from(v);
        }
        // API key: config file takes priority, env is the fallback.
        if config.llm.api_key.is_none() {
            config.llm.api_key = lookup("OPENAI_API_KEY");
        }
        config
    }
}
