//! The tuning domain: what can be tuned, what the model is told, and what
//! gets measured.
//!
//! - [`registry`]: sysctl parameter metadata and the per-process
//!   [`TunableSet`] resolved from the feature flags
//! - [`prompt`]: system prompt, first request and per-round feedback
//! - [`metric`]: pulls the training duration out of tool output

pub mod metric;
pub mod prompt;
pub mod registry;

pub use metric::MetricExtractor;
pub use prompt::PromptBuilder;
pub use registry::{
    CouplingLevel, ParamRange, ParameterRegistry, ParameterSpec, RecommendationReport, TunableSet,
};
