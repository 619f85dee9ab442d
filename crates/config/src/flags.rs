//! Feature-flag file loading.
//!
//! The flag file switches dynamic sysctl parameters on and off. It is a
//! line-oriented `key:value` text file:
//!
//! ```text
//! # hardware features
//! numa: true
//! ```
//!
//! A value is `true` iff it equals `true` case-insensitively. A missing file
//! means every switch is off.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::ConfigError;

/// Switch name → enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    flags: BTreeMap<String, bool>,
}

impl FeatureFlags {
    /// Load flags from a file. A missing file yields an empty set.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Flag file {} not found, all dynamic parameters disabled", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let flags = Self::parse(&content);
        debug!(path = %path.display(), count = flags.len(), "Loaded feature flags");
        Ok(flags)
    }

    /// Parse flag file content. Lines without a colon are skipped.
    pub fn parse(content: &str) -> Self {
        let mut flags = BTreeMap::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                warn!(line = lineno + 1, "Skipping malformed flag line: {line}");
                continue;
            };
            flags.insert(
                key.trim().to_string(),
                value.trim().eq_ignore_ascii_case("true"),
            );
        }
        Self { flags }
    }

    /// Build flags from explicit pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        Self {
            flags: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Whether `switch` is on. Unknown switches are off.
    pub fn is_enabled(&self, switch: &str) -> bool {
        self.flags.get(switch).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
