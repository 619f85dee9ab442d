pub mod config_cmd;
pub mod doctor;
pub mod params;
pub mod prompt;
pub mod run;

use kerneltune_config::{AppConfig, FeatureFlags};
use kerneltune_tuning::{ParameterRegistry, PromptBuilder};
use std::path::Path;

/// Load the config from `path` if given, else from the default locations.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Load the feature flags, preferring `flags` over `config.flags_path`.
pub fn load_flags(
    config: &AppConfig,
    flags: Option<&Path>,
) -> Result<FeatureFlags, Box<dyn std::error::Error>> {
    let path = flags.unwrap_or(config.flags_path.as_path());
    Ok(FeatureFlags::load_from(path)?)
}

/// Prompt builder for the parameters enabled by `flags`.
pub fn prompt_builder(config: &AppConfig, flags: &FeatureFlags) -> PromptBuilder {
    let tunables = ParameterRegistry::builtin().resolve(flags);
    PromptBuilder::new(config.environment.clone(), config.tuning.phases.clone(), tunables)
        .with_target_ratio(config.tuning.target_ratio)
}
