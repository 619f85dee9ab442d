//! The tuning loop.
//!
//! Each step follows a **Think → Act → Evaluate** cycle:
//!
//! 1. **Think**: send the conversation, system prompt and tool schema to
//!    the model
//! 2. **Act**: run every requested tool call in order and append the results
//! 3. **Evaluate**: read the training duration from this step's tool output,
//!    compare it with the baseline, advance the phase and append feedback
//!
//! The loop stops when the performance goal is reached, the model stops
//! calling tools, a model call fails, or the step budget runs out. Every
//! run ends with a [`RunSummary`].

pub mod loop_runner;
pub mod summary;

pub use loop_runner::TuningAgent;
pub use summary::{RoundRecord, RunSummary, Termination};
