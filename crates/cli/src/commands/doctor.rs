//! `kerneltune doctor`: diagnose configuration, flags and the model server.

use kerneltune_core::provider::Provider;
use kerneltune_providers::OpenAiCompatProvider;
use kerneltune_tuning::ParameterRegistry;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("KernelTune Doctor");
    println!("=================\n");

    let mut issues = 0;

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] {e}");
            println!("\n  1 issue found.");
            return Ok(());
        }
    };

    if config.tuning.refinement_reachable() {
        println!("  [ok]   All phases reachable before the target");
    } else {
        println!(
            "  [warn] target_ratio {} is below the refinement threshold {}; refinement never runs",
            config.tuning.target_ratio, config.tuning.thresholds.exploitation
        );
    }

    if config.flags_path.exists() {
        match super::load_flags(&config, None) {
            Ok(flags) => {
                let tunables = ParameterRegistry::builtin().resolve(&flags);
                println!(
                    "  [ok]   Flag file {} ({} parameters tunable)",
                    config.flags_path.display(),
                    tunables.len()
                );
            }
            Err(e) => {
                println!("  [fail] {e}");
                issues += 1;
            }
        }
    } else {
        println!(
            "  [warn] No flag file at {}; dynamic parameters disabled",
            config.flags_path.display()
        );
    }

    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key; requests are sent without Authorization");
    }

    match OpenAiCompatProvider::from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  [ok]   Model server reachable at {}", config.base_url),
            Ok(false) => {
                println!("  [fail] Model server at {} returned an error", config.base_url);
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Model server at {}: {e}", config.base_url);
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] {e}");
            issues += 1;
        }
    }

    match tokio::process::Command::new(&config.tools.python)
        .arg("--version")
        .output()
        .await
    {
        Ok(out) if out.status.success() => println!("  [ok]   {} available", config.tools.python),
        _ => {
            println!("  [warn] {} not runnable; python_execute will fail", config.tools.python);
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
