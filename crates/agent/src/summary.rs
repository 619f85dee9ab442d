//! What a finished run reports.

use kerneltune_core::agent::AgentState;
use kerneltune_core::phase::Phase;
use serde::Serialize;
use std::fmt;

/// Why the loop left the Running state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// A sample improved on the baseline by at least the target ratio
    GoalReached { ratio: f64 },
    /// The step counter reached `max_steps`
    BudgetExhausted,
    /// The model answered without tool calls
    ModelFinished,
    /// The model call failed or timed out
    ThinkFailed { error: String },
}

impl Termination {
    /// Short machine-friendly label, used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoalReached { .. } => "goal_reached",
            Self::BudgetExhausted => "budget_exhausted",
            Self::ModelFinished => "model_finished",
            Self::ThinkFailed { .. } => "think_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::ThinkFailed { .. })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoalReached { ratio } => {
                write!(f, "performance goal reached ({:.2}% faster)", ratio * 100.0)
            }
            Self::BudgetExhausted => f.write_str("step budget exhausted"),
            Self::ModelFinished => f.write_str("model signaled completion"),
            Self::ThinkFailed { error } => write!(f, "model call failed: {error}"),
        }
    }
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub step: u32,
    /// Phase in effect while the step ran
    pub phase: Phase,
    /// Training duration measured in this step
    pub sample: Option<f64>,
    /// `(baseline - sample) / baseline`; `None` for the baseline round
    pub improvement_ratio: Option<f64>,
}

/// The outcome of [`TuningAgent::run`](crate::TuningAgent::run).
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub request: Option<String>,
    pub steps: u32,
    pub state: AgentState,
    pub last_response: Option<String>,
    pub termination: Termination,
    pub baseline: Option<f64>,
    pub best_sample: Option<f64>,
    pub final_phase: Phase,
    pub rounds: Vec<RoundRecord>,
}

impl RunSummary {
    /// Improvement of the best sample over the baseline.
    pub fn best_improvement(&self) -> Option<f64> {
        match (self.baseline, self.best_sample) {
            (Some(base), Some(best)) if base > 0.0 => Some((base - best) / base),
            _ => None,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary:")?;
        writeln!(f, "- User request: {}", self.request.as_deref().unwrap_or("unknown").trim())?;
        writeln!(f, "- Steps executed: {}", self.steps)?;
        writeln!(f, "- Final state: {}", self.state)?;
        writeln!(f, "- Termination: {}", self.termination)?;
        writeln!(f, "- Final phase: {}", self.final_phase)?;
        match self.baseline {
            Some(b) => writeln!(f, "- Baseline: {b:.4} seconds")?,
            None => writeln!(f, "- Baseline: not measured")?,
        }
        if let (Some(best), Some(gain)) = (self.best_sample, self.best_improvement()) {
            writeln!(f, "- Best: {best:.4} seconds ({:.2}% faster)", gain * 100.0)?;
        }
        write!(
            f,
            "- Main response: {}",
            self.last_response.as_deref().unwrap_or("no response").trim()
        )
    }
}
