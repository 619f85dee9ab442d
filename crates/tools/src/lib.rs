//! The tools the model acts through.
//!
//! - `bash_execute`: shell commands (`sysctl -w`, the training job, `grep`)
//! - `file_editor`: read and write files, list directories
//! - `python_execute`: run a Python snippet

pub mod bash;
pub mod file_editor;
pub mod python;

use kerneltune_config::ToolsConfig;
use kerneltune_core::tool::ToolRegistry;
use std::time::Duration;

pub use bash::BashTool;
pub use file_editor::FileEditorTool;
pub use python::PythonTool;

/// Create the tool registry a tuning run uses.
///
/// Every dispatch is bounded by `tools.timeout_secs` (0 disables the
/// bound); an empty
/// `allowed_commands` list lets `bash_execute` run anything.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(config.timeout_secs));
    registry.register(Box::new(BashTool::new(config.allowed_commands.clone())));
    registry.register(Box::new(FileEditorTool::new()));
    registry.register(Box::new(PythonTool::new(config.python.clone())));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerneltune_core::tool::{ToolCall, ToolResult};

    #[test]
    fn registry_lists_tools_in_name_order() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(
            registry.names(),
            vec!["bash_execute", "file_editor", "python_execute"]
        );
        let defs = registry.definitions();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].name, "bash_execute");
    }

    #[tokio::test]
    async fn allowlist_violation_dispatches_as_failure() {
        let config = ToolsConfig {
            allowed_commands: vec!["sysctl".into()],
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config);
        let call = ToolCall {
            id: "call_1".into(),
            name: "bash_execute".into(),
            arguments: serde_json::json!({"command": "reboot"}),
        };
        let result = registry.dispatch(&call).await;
        assert!(matches!(result, ToolResult::Failure { ref error } if error.contains("allowlist")));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let config = ToolsConfig {
            timeout_secs: 1,
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config);
        let call = ToolCall {
            id: "call_1".into(),
            name: "bash_execute".into(),
            arguments: serde_json::json!({"command": "sleep 10"}),
        };
        let result = registry.dispatch(&call).await;
        assert!(matches!(result, ToolResult::Failure { ref error } if error.contains("timed out")));
    }

    #[tokio::test]
    async fn zero_timeout_runs_commands_unbounded() {
        let config = ToolsConfig {
            timeout_secs: 0,
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config);
        let call = ToolCall {
            id: "call_1".into(),
            name: "bash_execute".into(),
            arguments: serde_json::json!({"command": "echo hi"}),
        };
        let result = registry.dispatch(&call).await;
        assert_eq!(result, ToolResult::success("hi"));
    }
}
