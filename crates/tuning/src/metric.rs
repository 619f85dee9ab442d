//! Performance signal extraction.
//!
//! The workload prints a line such as
//! `average training duration: 123.45 seconds`; that line, surfaced through
//! some tool's output, is the only structured signal the loop consumes.

use kerneltune_core::message::{Message, Role};
use regex_lite::Regex;

/// Default label preceding the duration.
pub const DEFAULT_METRIC_LABEL: &str = "average training duration";

/// Finds the most recent training duration in a conversation.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    pattern: Regex,
}

impl MetricExtractor {
    /// Build an extractor for `<label>: <number> seconds`.
    pub fn new(label: &str) -> Result<Self, regex_lite::Error> {
        let pattern = Regex::new(&format!(
            r"(?i){}:\s*([0-9.]+)\s*seconds",
            regex_lite::escape(label.trim())
        ))?;
        Ok(Self { pattern })
    }

    /// The duration in `text`, if a well-formed one is present.
    pub fn extract_from_text(&self, text: &str) -> Option<f64> {
        self.pattern
            .captures_iter(text)
            .find_map(|caps| caps[1].parse::<f64>().ok())
    }

    /// Scan tool messages newest-first and return the first duration found.
    ///
    /// Returns `None` when no tool message carries a parsable duration.
    pub fn extract(&self, messages: &[Message]) -> Option<f64> {
        messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Tool && !m.content.is_empty())
            .find_map(|m| self.extract_from_text(&m.content))
    }
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_METRIC_LABEL).expect("escaped default label compiles")
    }
}
