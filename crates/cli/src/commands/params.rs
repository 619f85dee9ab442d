//! `kerneltune params`: the parameter table under the current flags.

use kerneltune_tuning::ParameterRegistry;
use std::path::Path;

pub fn run(config_path: Option<&Path>, flags: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let flags = super::load_flags(&config, flags)?;
    let registry = ParameterRegistry::builtin();
    let tunables = registry.resolve(&flags);

    println!("Tunable parameters ({} of {}):", tunables.len(), registry.all().len());
    for line in tunables.render_table().lines() {
        println!("  {line}");
    }

    let inactive: Vec<_> = registry
        .all()
        .iter()
        .filter(|p| !tunables.contains(&p.name))
        .collect();
    if !inactive.is_empty() {
        println!();
        println!("Disabled by feature flags:");
        for p in inactive {
            let switch = p.switch.as_deref().unwrap_or("?");
            println!("  {} (set `{switch}:true` to enable)", p.name);
        }
    }

    Ok(())
}
