//! Tuning phases and the phase state machine.
//!
//! A run starts in [`Phase::Exploration`] and can only move forward:
//!
//! ```text
//! Exploration ──(ratio ≥ exploration)──▶ Exploitation ──(ratio ≥ exploitation)──▶ Refinement
//! ```
//!
//! Each phase carries [`PhaseRules`] that the feedback prompt hands to the
//! model: how many parameters must change per round, by how much, and which
//! impact tier to target first.

use serde::{Deserialize, Serialize};

/// How strongly a parameter is expected to move the workload's runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search aggressiveness, in the only order a run may traverse it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Exploration,
    Exploitation,
    Refinement,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Exploitation => "exploitation",
            Self::Refinement => "refinement",
        }
    }

    /// The phase after this one, if any.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Exploration => Some(Self::Exploitation),
            Self::Exploitation => Some(Self::Refinement),
            Self::Refinement => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exploration" => Ok(Self::Exploration),
            "exploitation" => Ok(Self::Exploitation),
            "refinement" => Ok(Self::Refinement),
            other => Err(format!("Unknown phase: {other}")),
        }
    }
}

/// What a round must do while a phase is in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRules {
    /// Minimum fractional change for every adjusted parameter (0.20 = 20%).
    pub min_change_ratio: f64,

    /// Minimum number of parameters that must change per round.
    pub min_changed_params: usize,

    /// Impact tier to adjust first.
    pub preferred_impact: ImpactLevel,

    /// Whether fractional values may be proposed.
    #[serde(default)]
    pub allow_float: bool,

    /// One-line description shown to the model.
    pub description: String,
}

/// Rules for every phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTable {
    #[serde(default = "default_exploration_rules")]
    pub exploration: PhaseRules,

    #[serde(default = "default_exploitation_rules")]
    pub exploitation: PhaseRules,

    #[serde(default = "default_refinement_rules")]
    pub refinement: PhaseRules,
}

fn default_exploration_rules() -> PhaseRules {
    PhaseRules {
        min_change_ratio: 0.20,
        min_changed_params: 6,
        preferred_impact: ImpactLevel::High,
        allow_float: false,
        description: "broad exploration across the whole range".into(),
    }
}

fn default_exploitation_rules() -> PhaseRules {
    PhaseRules {
        min_change_ratio: 0.05,
        min_changed_params: 3,
        preferred_impact: ImpactLevel::Medium,
        allow_float: false,
        description: "converge around the directions that helped".into(),
    }
}

fn default_refinement_rules() -> PhaseRules {
    PhaseRules {
        min_change_ratio: 0.01,
        min_changed_params: 1,
        preferred_impact: ImpactLevel::Medium,
        allow_float: false,
        description: "small-range fine tuning".into(),
    }
}

impl PhaseTable {
    pub fn rules(&self, phase: Phase) -> &PhaseRules {
        match phase {
            Phase::Exploration => &self.exploration,
            Phase::Exploitation => &self.exploitation,
            Phase::Refinement => &self.refinement,
        }
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            exploration: default_exploration_rules(),
            exploitation: default_exploitation_rules(),
            refinement: default_refinement_rules(),
        }
    }
}

/// Improvement ratios that move a run to the next phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    /// Exploration → Exploitation.
    #[serde(default = "default_exploration_threshold")]
    pub exploration: f64,

    /// Exploitation → Refinement.
    #[serde(default = "default_exploitation_threshold")]
    pub exploitation: f64,
}

fn default_exploration_threshold() -> f64 {
    0.05
}

fn default_exploitation_threshold() -> f64 {
    0.12
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            exploration: default_exploration_threshold(),
            exploitation: default_exploitation_threshold(),
        }
    }
}

impl PhaseThresholds {
    /// Decide the phase for the next round.
    ///
    /// `improvement_ratio` is `(baseline - sample) / baseline`; positive is
    /// faster. Advances at most one phase per call and never moves back.
    /// A NaN ratio never advances.
    pub fn advance(&self, current: Phase, improvement_ratio: f64) -> Phase {
        match current {
            Phase::Exploration if improvement_ratio >= self.exploration => Phase::Exploitation,
            Phase::Exploitation if improvement_ratio >= self.exploitation => Phase::Refinement,
            _ => current,
        }
    }
}
