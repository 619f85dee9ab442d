//! Prompt rendering.
//!
//! Three texts are produced:
//! - the system prompt ([`PromptBuilder::build_initial_prompt`]): environment,
//!   tools, commands and the parameter table
//! - the first user request ([`PromptBuilder::initial_request`]): the
//!   baseline round
//! - the feedback message after each measured round
//!   ([`PromptBuilder::build_feedback_prompt`])

use kerneltune_config::EnvironmentConfig;
use kerneltune_core::phase::{Phase, PhaseRules, PhaseTable};
use kerneltune_core::provider::ToolDefinition;
use std::fmt::Write as _;

use crate::registry::TunableSet;

/// Renders every prompt the tuning loop sends.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    environment: EnvironmentConfig,
    phases: PhaseTable,
    tunables: TunableSet,
    tools: Vec<(String, String)>,
    target_ratio: f64,
}

impl PromptBuilder {
    pub fn new(environment: EnvironmentConfig, phases: PhaseTable, tunables: TunableSet) -> Self {
        Self {
            environment,
            phases,
            tunables,
            tools: Vec::new(),
            target_ratio: 0.08,
        }
    }

    /// List these tools in the system prompt.
    pub fn with_tools(mut self, tools: &[ToolDefinition]) -> Self {
        self.tools = tools
            .iter()
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect();
        self
    }

    /// Improvement the run aims for, as a ratio.
    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio;
        self
    }

    pub fn tunables(&self) -> &TunableSet {
        &self.tunables
    }

    pub fn rules(&self, phase: Phase) -> &PhaseRules {
        self.phases.rules(phase)
    }

    /// The enabled parameter table.
    pub fn param_info(&self) -> String {
        self.tunables.render_table()
    }

    /// The system prompt: environment, tools, commands and parameters.
    ///
    /// Instructs the model to report every enabled parameter's default by
    /// key in the first round so a baseline can be measured.
    pub fn build_initial_prompt(&self) -> String {
        let env = &self.environment;
        let mut out = String::from(
            "Recommend sysctl settings for the experiment environment below. \
             You can use the available tools to complete the task.\n\n",
        );

        if !self.tools.is_empty() {
            out.push_str("[Available tools]\n");
            for (name, description) in &self.tools {
                let _ = writeln!(out, "  {name}: {description}");
            }
            out.push('\n');
        }

        out.push_str("[Experiment environment]\n");
        let _ = writeln!(out, "  CPU: {}", env.cpu);
        let _ = writeln!(out, "  Memory: {}", env.memory);
        let _ = writeln!(out, "  Disk: {}", env.disk);
        let _ = writeln!(out, "  Operating system: {}", env.os);
        let _ = writeln!(out, "  Deep learning model: {}", env.workload);
        for note in &env.notes {
            let _ = writeln!(out, "  {note}");
        }
        out.push('\n');

        out.push_str("[Common commands]\n");
        let _ = writeln!(out, "  Run training: {}", env.train_command);
        let _ = writeln!(out, "  Read the log: {}", env.log_command);
        out.push_str("  Set a parameter: sysctl -w <param_name>=<value>\n");
        if self.tunables.contains("transparent_hugepage") {
            out.push_str(
                "  Set transparent_hugepage: echo <mode> > /sys/kernel/mm/transparent_hugepage/enabled \
                 (0: always, 1: madvise, 2: never)\n",
            );
        }
        out.push('\n');

        out.push_str("[Tunable parameters]\n");
        for line in self.param_info().lines() {
            let _ = writeln!(out, "  {line}");
        }
        out.push('\n');

        out.push_str("[Task]\n");
        let _ = writeln!(
            out,
            "  Round 1: report the default value of every one of the {} parameters above \
             as 'key: value', apply them with shell commands, run the training once and \
             read the log to obtain the baseline training duration.",
            self.tunables.len()
        );
        out.push_str(
            "  Later rounds: follow the phase rules in each feedback message, report the \
             recommended values as 'key: value', apply them with shell commands, run the \
             training once and read the log.\n",
        );
        let _ = writeln!(
            out,
            "  Keep tuning until the training duration is at least {} faster than the baseline.",
            format_percent(self.target_ratio)
        );

        out
    }

    /// The first user message of a run.
    pub fn initial_request(&self) -> String {
        "[User request] Run the training once with every parameter at its default value \
         and read the log file.\n"
            .to_string()
    }

    /// Feedback for the next round.
    ///
    /// States the phase rules and, when `last_sample` is known, how it
    /// compares to `baseline`. A regression adds an instruction not to
    /// repeat a similar configuration.
    pub fn build_feedback_prompt(&self, phase: Phase, baseline: f64, last_sample: Option<f64>) -> String {
        let rules = self.phases.rules(phase);
        let mut out = String::from(
            "[User request] Recommend parameters according to the phase rules. Report every \
             recommended value as 'key: value', set all of them with shell commands, run the \
             training once and read the log file.\n",
        );

        out.push_str("[Phase rules]\n");
        let _ = writeln!(out, "- Current phase: {phase} ({})", rules.description);
        let _ = writeln!(out, "- Prioritize parameters with impact {}", rules.preferred_impact);
        let _ = writeln!(out, "- Change at least {} parameters", rules.min_changed_params);
        let _ = writeln!(
            out,
            "- Change each adjusted parameter by at least {} of its current value",
            format_percent(rules.min_change_ratio)
        );
        if !rules.allow_float {
            out.push_str("- Use integer values only\n");
        }

        out.push_str("[Performance feedback]\n");
        let _ = writeln!(out, "baseline: {baseline:.4} seconds");

        if let Some(diff) = last_sample.and_then(|s| percent_difference(baseline, s)) {
            if diff > 0.0 {
                let _ = writeln!(out, "The last round was {diff:.2}% slower than the baseline.");
                out.push_str(
                    "- The last parameter combination did not improve performance and counts as \
                     a failed configuration. Do not return a configuration similar to it this round.\n",
                );
            } else {
                let _ = writeln!(out, "The last round was {:.2}% faster than the baseline.", diff.abs());
            }
        }

        out
    }
}

/// `(sample - baseline) / baseline * 100`, or `None` when undefined.
pub fn percent_difference(baseline: f64, sample: f64) -> Option<f64> {
    if !baseline.is_finite() || !sample.is_finite() || baseline <= 0.0 {
        return None;
    }
    Some((sample - baseline) * 100.0 / baseline)
}

fn format_percent(ratio: f64) -> String {
    let pct = ratio * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}%", pct.round() as i64)
    } else {
        format!("{pct:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParameterRegistry;
    use kerneltune_config::FeatureFlags;

    fn builder(flags: FeatureFlags) -> PromptBuilder {
        let tunables = ParameterRegistry::builtin().resolve(&flags);
        PromptBuilder::new(EnvironmentConfig::default(), PhaseTable::default(), tunables)
    }

    #[test]
    fn initial_prompt_embeds_environment_and_table() {
        let tools = vec![ToolDefinition {
            name: "bash_execute".into(),
            description: "Run a shell command".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let prompt = builder(FeatureFlags::default())
            .with_tools(&tools)
            .build_initial_prompt();

        assert!(prompt.contains("CPU: 48 cores"));
        assert!(prompt.contains("Deep learning model: ResNet50"));
        assert!(prompt.contains("bash_execute: Run a shell command"));
        assert!(prompt.contains(
            "vm.swappiness: range 0-90, default 10, step 2, impact medium, coupling medium."
        ));
        assert!(prompt.contains("default value of every one of the 12 parameters"));
        assert!(prompt.contains("at least 8% faster"));
        assert!(!prompt.contains("numa_balancing"));
    }

    #[test]
    fn initial_prompt_includes_enabled_dynamic_parameter() {
        let prompt = builder(FeatureFlags::from_pairs([("numa", true)])).build_initial_prompt();
        assert!(prompt.contains("kernel.numa_balancing: range 0-1"));
        assert!(prompt.contains("every one of the 13 parameters"));
    }

    #[test]
    fn initial_prompt_is_reproducible() {
        let a = builder(FeatureFlags::from_pairs([("numa", true)])).build_initial_prompt();
        let b = builder(FeatureFlags::from_pairs([("numa", true)])).build_initial_prompt();
        assert_eq!(a, b);
    }

    #[test]
    fn feedback_reports_improvement() {
        let prompt = builder(FeatureFlags::default()).build_feedback_prompt(Phase::Exploration, 100.0, Some(90.0));
        assert!(prompt.contains("10.00% faster"), "{prompt}");
        assert!(!prompt.contains("failed configuration"));
        assert!(prompt.contains("baseline: 100.0000 seconds"));
    }

    #[test]
    fn feedback_reports_regression_with_avoidance_clause() {
        let prompt = builder(FeatureFlags::default()).build_feedback_prompt(Phase::Exploration, 100.0, Some(110.0));
        assert!(prompt.contains("10.00% slower"), "{prompt}");
        assert!(prompt.contains("Do not return a configuration similar"));
    }

    #[test]
    fn equal_sample_counts_as_faster() {
        let prompt = builder(FeatureFlags::default()).build_feedback_prompt(Phase::Exploration, 50.0, Some(50.0));
        assert!(prompt.contains("0.00% faster"));
        assert!(!prompt.contains("failed configuration"));
    }

    #[test]
    fn feedback_without_sample_omits_comparison() {
        let prompt = builder(FeatureFlags::default()).build_feedback_prompt(Phase::Exploration, 100.0, None);
        assert!(!prompt.contains("The last round was"));
        assert!(prompt.contains("baseline: 100.0000 seconds"));
        assert!(!prompt.contains("NaN"));
        assert!(!prompt.contains("faster than"));
        assert!(!prompt.contains("slower than"));
    }

    #[test]
    fn feedback_with_degenerate_baseline_omits_comparison() {
        let prompt = builder(FeatureFlags::default()).build_feedback_prompt(Phase::Exploration, 0.0, Some(10.0));
        assert!(!prompt.contains("NaN"));
        assert!(!prompt.contains("inf"));
        assert!(!prompt.contains("than the baseline"));
    }

    #[test]
    fn feedback_states_phase_rules() {
        let b = builder(FeatureFlags::default());
        let prompt = b.build_feedback_prompt(Phase::Exploration, 100.0, None);
        assert!(prompt.contains("Current phase: exploration"));
        assert!(prompt.contains("impact high"));
        assert!(prompt.contains("at least 6 parameters"));
        assert!(prompt.contains("at least 20% of its current value"));

        let prompt = b.build_feedback_prompt(Phase::Refinement, 100.0, None);
        assert!(prompt.contains("Current phase: refinement"));
        assert!(prompt.contains("at least 1 parameters"));
        assert!(prompt.contains("at least 1% of its current value"));
    }

    #[test]
    fn percent_difference_guards() {
        assert_eq!(percent_difference(0.0, 1.0), None);
        assert_eq!(percent_difference(-5.0, 1.0), None);
        assert_eq!(percent_difference(f64::NAN, 1.0), None);
        let d = percent_difference(200.0, 150.0).unwrap();
        assert!((d + 25.0).abs() < 1e-9);
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(0.08), "8%");
        assert_eq!(format_percent(0.2), "20%");
        assert_eq!(format_percent(0.025), "2.5%");
    }
}
