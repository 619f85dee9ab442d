//! Configuration loading, validation, and management for KernelTune.
//!
//! Loads configuration from `./kerneltune.toml`, falling back to
//! `~/.kerneltune/config.toml`, with environment variable overrides.
//! Validates all settings at startup.

pub mod flags;

pub use flags::FeatureFlags;

use kerneltune_core::phase::{PhaseTable, PhaseThresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout for the model endpoint
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path of the `key:value` feature-flag file
    #[serde(default = "default_flags_path")]
    pub flags_path: PathBuf,

    /// Loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Thresholds, targets and phase rules
    #[serde(default)]
    pub tuning: TuningConfig,

    /// Tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Facts about the machine under tuning, passed to the model verbatim
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

fn default_base_url() -> String {
    "http://localhost:8001/v1".into()
}
fn default_model() -> String {
    "output/qwen3_lora".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_flags_path() -> PathBuf {
    PathBuf::from("./sys.config")
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("flags_path", &self.flags_path)
            .field("agent", &self.agent)
            .field("tuning", &self.tuning)
            .field("tools", &self.tools)
            .field("environment", &self.environment)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Step budget for one run (the baseline round counts as step 1)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Upper bound on a single model call
    #[serde(default = "default_think_timeout_secs")]
    pub think_timeout_secs: u64,
}

fn default_max_steps() -> u32 {
    10
}
fn default_think_timeout_secs() -> u64 {
    600
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            think_timeout_secs: default_think_timeout_secs(),
        }
    }
}

/// Every threshold the tuning loop uses, in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Improvement ratio at which the run stops with the goal reached
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f64,

    /// Label preceding the duration in workload output
    #[serde(default = "default_metric_label")]
    pub metric_label: String,

    /// Phase advance thresholds
    #[serde(default)]
    pub thresholds: PhaseThresholds,

    /// Per-phase round rules
    #[serde(default)]
    pub phases: PhaseTable,
}

fn default_target_ratio() -> f64 {
    0.08
}
fn default_metric_label() -> String {
    "average training duration".into()
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            target_ratio: default_target_ratio(),
            metric_label: default_metric_label(),
            thresholds: PhaseThresholds::default(),
            phases: PhaseTable::default(),
        }
    }
}

impl TuningConfig {
    /// Whether the Refinement phase can ever be entered before the goal stops the run.
    pub fn refinement_reachable(&self) -> bool {
        self.thresholds.exploitation < self.target_ratio
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Upper bound on a single tool call in seconds (training runs are long); 0 disables it
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// If non-empty, only these base commands may run in `bash_execute`
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    /// Python interpreter used by `python_execute`
    #[serde(default = "default_python")]
    pub python: String,
}

fn default_tool_timeout_secs() -> u64 {
    3600
}
fn default_python() -> String {
    "python3".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            allowed_commands: Vec::new(),
            python: default_python(),
        }
    }
}

/// Opaque facts about the experiment environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_cpu")]
    pub cpu: String,

    #[serde(default = "default_memory")]
    pub memory: String,

    #[serde(default = "default_disk")]
    pub disk: String,

    #[serde(default = "default_os")]
    pub os: String,

    #[serde(default = "default_workload")]
    pub workload: String,

    /// Command that runs one training round
    #[serde(default = "default_train_command")]
    pub train_command: String,

    /// Command that prints the duration line from the workload log
    #[serde(default = "default_log_command")]
    pub log_command: String,

    /// Extra free-form lines appended to the environment section
    #[serde(default)]
    pub notes: Vec<String>,
}

fn default_cpu() -> String {
    "48 cores".into()
}
fn default_memory() -> String {
    "366GB".into()
}
fn default_disk() -> String {
    "250GB SSD".into()
}
fn default_os() -> String {
    "Ubuntu 22.04".into()
}
fn default_workload() -> String {
    "ResNet50".into()
}
fn default_train_command() -> String {
    "python /opt/workload/resnet50.py".into()
}
fn default_log_command() -> String {
    "grep \"average training duration:\" /opt/workload/result.log && rm -f /opt/workload/result.log".into()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            disk: default_disk(),
            os: default_os(),
            workload: default_workload(),
            train_command: default_train_command(),
            log_command: default_log_command(),
            notes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default locations.
    ///
    /// `./kerneltune.toml` wins over `~/.kerneltune/config.toml`. Environment
    /// variables override the file:
    /// - `KERNELTUNE_API_KEY`, then `OPENAI_API_KEY`
    /// - `KERNELTUNE_BASE_URL`
    /// - `KERNELTUNE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from("kerneltune.toml");
        let path = if local.exists() {
            local
        } else {
            Self::config_dir().join("config.toml")
        };
        Self::load_with_env(&path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("KERNELTUNE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(base_url) = std::env::var("KERNELTUNE_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(model) = std::env::var("KERNELTUNE_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kerneltune")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        let t = &self.tuning;
        if t.target_ratio <= 0.0 || t.thresholds.exploration <= 0.0 || t.thresholds.exploitation <= 0.0 {
            return Err(ConfigError::ValidationError(
                "tuning.target_ratio and tuning.thresholds must be positive".into(),
            ));
        }

        if t.thresholds.exploration > t.thresholds.exploitation {
            return Err(ConfigError::ValidationError(
                "tuning.thresholds.exploration must not exceed tuning.thresholds.exploitation".into(),
            ));
        }

        if t.metric_label.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tuning.metric_label must not be empty".into(),
            ));
        }

        for phase in [&t.phases.exploration, &t.phases.exploitation, &t.phases.refinement] {
            if phase.min_change_ratio < 0.0 {
                return Err(ConfigError::ValidationError(
                    "tuning.phases.*.min_change_ratio must not be negative".into(),
                ));
            }
        }

        if !t.refinement_reachable() {
            tracing::warn!(
                target_ratio = t.target_ratio,
                exploitation = t.thresholds.exploitation,
                "Target ratio is reached before the refinement threshold; refinement phase is unreachable"
            );
        }

        Ok(())
    }

    /// Whether requests carry a bearer token. Local servers usually need none.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            flags_path: default_flags_path(),
            agent: AgentSettings::default(),
            tuning: TuningConfig::default(),
            tools: ToolsConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
