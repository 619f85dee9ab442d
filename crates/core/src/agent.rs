//! Agent lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle of a tuning run.
///
/// `Idle` at construction, `Running` once the loop starts, `Finished` when
/// the loop exits for any reason. `Finished` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
}

impl AgentState {
    /// Move to `next` unless the state is already terminal.
    ///
    /// Returns the state after the attempted transition.
    pub fn transition(&mut self, next: AgentState) -> AgentState {
        if *self != AgentState::Finished {
            *self = next;
        }
        *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
