//! `kerneltune config`: print the effective configuration.

use kerneltune_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let mut config = super::load_config(config_path)?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
