//! `kerneltune prompt`: print what the model sees on its first step.

use std::path::Path;

pub fn run(config_path: Option<&Path>, flags: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let flags = super::load_flags(&config, flags)?;
    let tools = kerneltune_tools::default_registry(&config.tools);
    let prompts = super::prompt_builder(&config, &flags).with_tools(&tools.definitions());

    println!("=== system ===");
    println!("{}", prompts.build_initial_prompt());
    println!("=== user ===");
    println!("{}", prompts.initial_request());
    Ok(())
}
