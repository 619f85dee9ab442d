//! Sysctl parameter metadata.
//!
//! Parameters come in two kinds:
//! - **fixed**: always tunable
//! - **dynamic**: tunable only while their switch is on in the
//!   [`FeatureFlags`]
//!
//! The [`ParameterRegistry`] holds the full table in declared order. At
//! startup it is resolved against the flags into a [`TunableSet`], which is
//! what the prompts render and what recommendations are checked against for
//! the rest of the process.

use kerneltune_config::FeatureFlags;
use kerneltune_core::phase::ImpactLevel;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// How strongly a parameter interacts with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouplingLevel {
    Low,
    Medium,
}

impl std::fmt::Display for CouplingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
        })
    }
}

/// The values a parameter accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamRange {
    /// Inclusive numeric span.
    Span { min: i64, max: i64 },
    /// Enumerated values.
    Choices(Vec<i64>),
}

impl ParamRange {
    pub fn contains(&self, value: i64) -> bool {
        match self {
            Self::Span { min, max } => (*min..=*max).contains(&value),
            Self::Choices(values) => values.contains(&value),
        }
    }
}

impl std::fmt::Display for ParamRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Span { min, max } => write!(f, "{min}-{max}"),
            Self::Choices(values) => {
                let joined: Vec<String> = values.iter().map(i64::to_string).collect();
                f.write_str(&joined.join("/"))
            }
        }
    }
}

/// Metadata for one tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Dotted sysctl name, or a path-like name for non-sysctl knobs
    pub name: String,
    pub range: ParamRange,
    pub default: i64,
    pub step: i64,
    pub impact: ImpactLevel,
    pub coupling: CouplingLevel,
    /// Feature flag that enables this parameter; `None` for fixed parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch: Option<String>,
}

impl ParameterSpec {
    fn fixed(
        name: &str,
        range: ParamRange,
        default: i64,
        step: i64,
        impact: ImpactLevel,
        coupling: CouplingLevel,
    ) -> Self {
        Self {
            name: name.into(),
            range,
            default,
            step,
            impact,
            coupling,
            switch: None,
        }
    }

    fn behind(mut self, switch: &str) -> Self {
        self.switch = Some(switch.into());
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.switch.is_some()
    }

    /// Whether this parameter is tunable under `flags`.
    pub fn is_active(&self, flags: &FeatureFlags) -> bool {
        match &self.switch {
            None => true,
            Some(switch) => flags.is_enabled(switch),
        }
    }

    /// One line of the parameter table shown to the model.
    pub fn render(&self) -> String {
        format!(
            "{}: range {}, default {}, step {}, impact {}, coupling {}.",
            self.name, self.range, self.default, self.step, self.impact, self.coupling
        )
    }
}

/// The full parameter table, in declared order.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    params: Vec<ParameterSpec>,
}

impl ParameterRegistry {
    pub fn new(params: Vec<ParameterSpec>) -> Self {
        Self { params }
    }

    /// The built-in table for a training host.
    pub fn builtin() -> Self {
        use CouplingLevel as C;
        use ImpactLevel as I;
        use ParamRange::Span;

        Self::new(vec![
            ParameterSpec::fixed("fs.file-max", Span { min: 1_000_000, max: 30_000_000 }, 1_048_576, 1_000_000, I::High, C::Low),
            ParameterSpec::fixed("kernel.threads-max", Span { min: 655_360, max: 65_536_000 }, 3_092_111, 655_360, I::High, C::Low),
            ParameterSpec::fixed("vm.watermark_scale_factor", Span { min: 10, max: 1000 }, 10, 10, I::High, C::Low),
            ParameterSpec::fixed("vm.page-cluster", Span { min: 0, max: 8 }, 3, 1, I::High, C::Low),
            ParameterSpec::fixed("transparent_hugepage", Span { min: 0, max: 2 }, 1, 1, I::High, C::Low),
            ParameterSpec::fixed("vm.dirty_background_ratio", Span { min: 0, max: 80 }, 10, 2, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.dirty_expire_centisecs", Span { min: 0, max: 5000 }, 3000, 200, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.dirty_ratio", Span { min: 0, max: 80 }, 30, 2, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.dirty_writeback_centisecs", Span { min: 100, max: 1000 }, 500, 100, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.overcommit_memory", ParamRange::Choices(vec![0, 1, 2]), 0, 1, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.overcommit_ratio", Span { min: 0, max: 100 }, 50, 10, I::Medium, C::Medium),
            ParameterSpec::fixed("vm.swappiness", Span { min: 0, max: 90 }, 10, 2, I::Medium, C::Medium),
            ParameterSpec::fixed("kernel.numa_balancing", Span { min: 0, max: 1 }, 1, 1, I::Medium, C::Medium)
                .behind("numa"),
        ])
    }

    /// Every parameter, active or not.
    pub fn all(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameters tunable under `flags`, in declared order.
    pub fn enabled<'a>(&'a self, flags: &FeatureFlags) -> Vec<&'a ParameterSpec> {
        self.params.iter().filter(|p| p.is_active(flags)).collect()
    }

    /// Freeze the tunable parameters for this process.
    pub fn resolve(&self, flags: &FeatureFlags) -> TunableSet {
        let params: Vec<ParameterSpec> = self.enabled(flags).into_iter().cloned().collect();
        debug!(
            tunable = params.len(),
            disabled = self.params.len() - params.len(),
            "Resolved tunable parameters"
        );
        TunableSet { params }
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_\-]*(?:[./][A-Za-z0-9_\-]+)*)\s*[:=]\s*(-?[0-9]+)\b")
        .expect("hardcoded regex")
});

/// The parameters tunable for the lifetime of this process.
#[derive(Debug, Clone, PartialEq)]
pub struct TunableSet {
    params: Vec<ParameterSpec>,
}

impl TunableSet {
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The parameter table, one line per parameter.
    pub fn render_table(&self) -> String {
        self.params
            .iter()
            .map(ParameterSpec::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Default value of every parameter, keyed by name.
    pub fn defaults(&self) -> BTreeMap<String, i64> {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.default))
            .collect()
    }

    /// Check `key: value` / `key=value` assignments found in model text.
    ///
    /// Only dotted names (and names of this set) count as assignments, so
    /// prose like `step 1: 5` is ignored.
    pub fn check_recommendation(&self, text: &str) -> RecommendationReport {
        let mut report = RecommendationReport::default();

        for caps in ASSIGNMENT.captures_iter(text) {
            let key = &caps[1];
            let Ok(value) = caps[2].parse::<i64>() else {
                continue;
            };

            match self.get(key) {
                Some(spec) => {
                    if !spec.range.contains(value) {
                        report.out_of_range.insert(key.to_string(), value);
                    }
                    report.values.insert(key.to_string(), value);
                }
                None if key.contains('.') => {
                    if !report.unknown.iter().any(|k| k == key) {
                        report.unknown.push(key.to_string());
                    }
                }
                None => {}
            }
        }

        report.missing = self
            .params
            .iter()
            .filter(|p| !report.values.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect();

        report
    }
}

/// What a model recommendation contained, relative to a [`TunableSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationReport {
    /// Recognised assignments (last one wins per key)
    pub values: BTreeMap<String, i64>,
    /// Dotted names that are not tunable in this process
    pub unknown: Vec<String>,
    /// Recognised assignments outside the parameter's range
    pub out_of_range: BTreeMap<String, i64>,
    /// Tunable parameters with no assignment
    pub missing: Vec<String>,
}

impl RecommendationReport {
    /// No assignments were found at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every tunable parameter has an in-range value and nothing unknown was named.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.out_of_range.is_empty() && self.unknown.is_empty()
    }

    /// Number of parameters whose value differs from `previous`.
    ///
    /// A key absent from `previous` counts as changed.
    pub fn changed_from(&self, previous: &BTreeMap<String, i64>) -> usize {
        self.values
            .iter()
            .filter(|(k, v)| previous.get(*k) != Some(*v))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numa(on: bool) -> FeatureFlags {
        FeatureFlags::from_pairs([("numa", on)])
    }

    #[test]
    fn builtin_table_shape() {
        let registry = ParameterRegistry::builtin();
        assert_eq!(registry.all().len(), 13);
        let dynamic: Vec<&str> = registry
            .all()
            .iter()
            .filter(|p| p.is_dynamic())
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(dynamic, vec!["kernel.numa_balancing"]);
    }

    #[test]
    fn fixed_parameters_always_present_exactly_once() {
        let registry = ParameterRegistry::builtin();
        for flags in [FeatureFlags::default(), numa(false), numa(true)] {
            let enabled = registry.enabled(&flags);
            for fixed in registry.all().iter().filter(|p| !p.is_dynamic()) {
                let count = enabled.iter().filter(|p| p.name == fixed.name).count();
                assert_eq!(count, 1, "{} under {flags:?}", fixed.name);
            }
        }
    }

    #[test]
    fn dynamic_parameter_follows_its_switch() {
        let registry = ParameterRegistry::builtin();
        let has_numa = |flags: &FeatureFlags| {
            registry
                .enabled(flags)
                .iter()
                .any(|p| p.name == "kernel.numa_balancing")
        };
        assert!(!has_numa(&FeatureFlags::default()));
        assert!(!has_numa(&numa(false)));
        assert!(has_numa(&numa(true)));
        assert!(!has_numa(&FeatureFlags::from_pairs([("other", true)])));
    }

    #[test]
    fn disabled_parameter_never_rendered() {
        let set = ParameterRegistry::builtin().resolve(&numa(false));
        assert!(!set.render_table().contains("numa_balancing"));
        assert_eq!(set.len(), 12);

        let set = ParameterRegistry::builtin().resolve(&numa(true));
        assert!(set.render_table().contains("kernel.numa_balancing"));
        assert_eq!(set.len(), 13);
    }

    #[test]
    fn rendering_is_deterministic_and_ordered() {
        let registry = ParameterRegistry::builtin();
        let a = registry.resolve(&numa(true)).render_table();
        let b = registry.resolve(&numa(true)).render_table();
        assert_eq!(a, b);

        let names = registry.resolve(&FeatureFlags::default());
        let names = names.names();
        assert_eq!(names[0], "fs.file-max");
        assert_eq!(names[4], "transparent_hugepage");
        assert_eq!(names[11], "vm.swappiness");
    }

    #[test]
    fn render_line_format() {
        let registry = ParameterRegistry::builtin();
        assert_eq!(
            registry.get("vm.swappiness").unwrap().render(),
            "vm.swappiness: range 0-90, default 10, step 2, impact medium, coupling medium."
        );
        assert_eq!(
            registry.get("vm.overcommit_memory").unwrap().render(),
            "vm.overcommit_memory: range 0/1/2, default 0, step 1, impact medium, coupling medium."
        );
    }

    #[test]
    fn ranges_contain() {
        assert!(ParamRange::Span { min: 0, max: 80 }.contains(80));
        assert!(!ParamRange::Span { min: 0, max: 80 }.contains(81));
        assert!(ParamRange::Choices(vec![0, 1, 2]).contains(2));
        assert!(!ParamRange::Choices(vec![0, 1, 2]).contains(3));
    }

    #[test]
    fn recommendation_report() {
        let set = ParameterRegistry::builtin().resolve(&numa(false));
        let text = "Proposed settings:\n\
                    - vm.swappiness: 20\n\
                    - vm.dirty_ratio=95\n\
                    kernel.numa_balancing: 0\n\
                    step 1: run the workload\n\
                    transparent_hugepage: 2\n";
        let report = set.check_recommendation(text);

        assert_eq!(report.values.get("vm.swappiness"), Some(&20));
        assert_eq!(report.values.get("transparent_hugepage"), Some(&2));
        assert_eq!(report.out_of_range.get("vm.dirty_ratio"), Some(&95));
        assert_eq!(report.unknown, vec!["kernel.numa_balancing".to_string()]);
        assert_eq!(report.missing.len(), 12 - 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn defaults_recommendation_is_complete() {
        let set = ParameterRegistry::builtin().resolve(&FeatureFlags::default());
        let text: String = set
            .defaults()
            .iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect();
        let report = set.check_recommendation(&text);
        assert!(report.is_complete());
        assert_eq!(report.changed_from(&set.defaults()), 0);
    }

    #[test]
    fn changed_from_counts_differences() {
        let set = ParameterRegistry::builtin().resolve(&FeatureFlags::default());
        let report = set.check_recommendation("vm.swappiness: 30\nvm.dirty_ratio: 30\nvm.page-cluster: 0");
        assert_eq!(report.changed_from(&set.defaults()), 2);
    }
}
