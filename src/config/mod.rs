//! Configuration for docreview.
//!
//! All sections are optional; missing fields take their defaults so a
//! partial file is always valid. Reasoning-service connection details come
//! from the environment (see [`crate::llm::LlmDeviceConfig`]).

mod loader;

pub use loader::{discover_config_path, load_config, ConfigError, LoadOptions, CONFIG_FILENAME};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::chunker::DEFAULT_MAX_CHUNK_CHARS;
use crate::analysis::{
    ClassifierConfig, ExecutorSettings, LocationConfig, OrchestratorSettings, RetryPolicy,
};
use crate::llm::LlmConfig;
use crate::plugins::{CustomPluginConfig, BUILTIN_PLUGINS};

/// `[analysis]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Global cap on concurrent reasoning calls.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// Per-call deadline.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Retries after the first attempt, for transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Ask the reasoning service to locate quotes the local chain missed.
    #[serde(default = "default_true")]
    pub allow_escalation: bool,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_chunk_chars: default_max_chunk_chars(),
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            allow_escalation: true,
        }
    }
}

impl AnalysisConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }
}

/// `[plugins]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugins to run, by name. Defaults to all built-ins.
    #[serde(default = "default_enabled_plugins")]
    pub enabled: Vec<String>,
    /// User-defined plugins (`[[plugins.custom]]`).
    #[serde(default)]
    pub custom: Vec<CustomPluginConfig>,
}

fn default_enabled_plugins() -> Vec<String> {
    BUILTIN_PLUGINS.iter().map(|s| s.to_string()).collect()
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_plugins(),
            custom: Vec::new(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// File this config was loaded from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Reject settings that would make analysis meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.analysis.max_concurrency == 0 {
            return invalid("analysis.max_concurrency must be at least 1".into());
        }
        if self.analysis.max_chunk_chars == 0 {
            return invalid("analysis.max_chunk_chars must be at least 1".into());
        }
        if self.analysis.call_timeout_secs == 0 {
            return invalid("analysis.call_timeout_secs must be at least 1".into());
        }
        let unit = |v: f64| v > 0.0 && v <= 1.0;
        if !unit(self.location.fuzzy_threshold) {
            return invalid(format!(
                "location.fuzzy_threshold must be in (0, 1], got {}",
                self.location.fuzzy_threshold
            ));
        }
        if !unit(self.classifier.mixed_ratio) {
            return invalid(format!(
                "classifier.mixed_ratio must be in (0, 1], got {}",
                self.classifier.mixed_ratio
            ));
        }
        if self.classifier.min_evidence_weight < 0.0 {
            return invalid("classifier.min_evidence_weight must not be negative".into());
        }

        for custom in &self.plugins.custom {
            custom.validate().map_err(ConfigError::Invalid)?;
        }
        for name in &self.plugins.enabled {
            let known = BUILTIN_PLUGINS.contains(&name.as_str())
                || self.plugins.custom.iter().any(|c| &c.name == name);
            if !known {
                return invalid(format!("plugins.enabled names unknown plugin '{}'", name));
            }
        }
        Ok(())
    }

    /// Settings for an [`crate::analysis::Orchestrator`].
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_concurrency: self.analysis.max_concurrency,
            max_chunk_chars: self.analysis.max_chunk_chars,
            call_timeout: Duration::from_secs(self.analysis.call_timeout_secs),
            executor: ExecutorSettings {
                retry: self.analysis.retry_policy(),
                allow_escalation: self.analysis.allow_escalation,
            },
            location: self.location.clone(),
            classifier: self.classifier.clone(),
        }
    }
}
