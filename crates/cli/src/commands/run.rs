//! `kerneltune run`: one tuning session against the configured model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kerneltune_agent::TuningAgent;
use kerneltune_core::event::{DomainEvent, EventBus};
use kerneltune_core::message::Conversation;
use kerneltune_core::provider::Provider;
use kerneltune_providers::OpenAiCompatProvider;
use tokio::sync::broadcast::error::RecvError;

pub struct RunOptions {
    pub max_steps: Option<u32>,
    pub target: Option<f64>,
    pub flags: Option<PathBuf>,
    pub json: bool,
    pub transcript: Option<PathBuf>,
}

pub async fn run(
    config_path: Option<&Path>,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(max_steps) = options.max_steps {
        config.agent.max_steps = max_steps;
    }
    if let Some(target) = options.target {
        config.tuning.target_ratio = target;
    }
    config.validate()?;

    let flags = super::load_flags(&config, options.flags.as_deref())?;
    let prompts = super::prompt_builder(&config, &flags);

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    let tools = Arc::new(kerneltune_tools::default_registry(&config.tools));
    let event_bus = Arc::new(EventBus::default());

    let agent = TuningAgent::from_config(&config, provider, tools, prompts, event_bus.clone())?;

    if !options.json {
        println!();
        println!("  KernelTune");
        println!("  Model:      {} @ {}", config.model, config.base_url);
        println!("  Parameters: {}", flags_summary(&flags));
        println!("  Budget:     {} steps", agent.max_steps());
        println!("  Target:     {:.1}% faster than baseline", config.tuning.target_ratio * 100.0);
    }

    let printer = (!options.json).then(|| tokio::spawn(print_events(event_bus.subscribe())));

    let mut conversation = Conversation::new();
    let summary = agent.run(&mut conversation).await;

    // Close the bus so the printer drains and exits.
    drop(agent);
    drop(event_bus);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if let Some(path) = &options.transcript {
        std::fs::write(path, serde_json::to_string_pretty(&conversation)?)
            .map_err(|e| format!("Failed to write transcript {}: {e}", path.display()))?;
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("{summary}");
    }

    Ok(())
}

fn flags_summary(flags: &kerneltune_config::FeatureFlags) -> String {
    let enabled: Vec<&str> = flags
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| name)
        .collect();
    if enabled.is_empty() {
        "fixed set only".into()
    } else {
        format!("fixed set + {}", enabled.join(", "))
    }
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        match event.as_ref() {
            DomainEvent::StepStarted { step, phase, .. } => {
                println!("\n--- Step {step} ({phase}) ---");
            }
            DomainEvent::ResponseGenerated { tool_calls, .. } => {
                println!("  model requested {tool_calls} tool call(s)");
            }
            DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } => {
                let mark = if *success { "ok" } else { "failed" };
                println!("  {tool_name}: {mark} ({duration_ms} ms)");
            }
            DomainEvent::SampleMeasured {
                seconds,
                improvement_ratio,
                ..
            } => match improvement_ratio {
                None => println!("  baseline: {seconds:.4} seconds"),
                Some(r) => println!("  sample: {seconds:.4} seconds ({:+.2}% vs baseline)", -r * 100.0),
            },
            DomainEvent::PhaseChanged { from, to, .. } => {
                println!("  phase: {from} -> {to}");
            }
            DomainEvent::RunFinished { steps, reason, .. } => {
                println!("\n  finished after {steps} step(s): {reason}");
            }
        }
    }
}
