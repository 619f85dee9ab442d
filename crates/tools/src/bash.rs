//! Bash tool: run shell commands such as `sysctl -w` and the training job.
//!
//! Supports command allowlisting. The registry imposes the timeout; the
//! child process is killed when the call is dropped.

use async_trait::async_trait;
use kerneltune_core::error::ToolError;
use kerneltune_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

const NAME: &str = "bash_execute";

/// Execute shell commands with an optional allowlist.
pub struct BashTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
}

impl BashTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    /// Every segment of a compound command must start with an allowed word.
    fn disallowed_command<'a>(&self, command: &'a str) -> Option<&'a str> {
        if self.allowed_commands.is_empty() {
            return None;
        }

        command
            .split(['&', '|', ';', '\n'])
            .filter_map(|segment| segment.split_whitespace().next())
            .find(|base| !self.allowed_commands.iter().any(|a| a == base))
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute a command line command and return stdout/stderr. Use this to set sysctl \
         parameters, run the training job and read its log."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Some(base) = self.disallowed_command(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: NAME.into(),
                reason: format!("Command '{base}' not in allowlist"),
            });
        }

        debug!(command = %command, "Executing shell command");

        let output = Command::new("bash")
            .args(["-c", command])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let text = if stderr.trim().is_empty() {
                stdout.into_owned()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(ToolResult::success(text.trim()))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(ToolResult::failure(
                format!("[exit code: {code}]\n{stdout}\n{stderr}").trim(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_check() {
        let tool = BashTool::new(vec!["sysctl".into(), "cat".into(), "python".into()]);
        assert_eq!(tool.disallowed_command("sysctl -w vm.swappiness=10"), None);
        assert_eq!(tool.disallowed_command("cat /proc/meminfo"), None);
        assert_eq!(tool.disallowed_command("rm -rf /"), Some("rm"));
        assert_eq!(
            tool.disallowed_command("sysctl -w vm.swappiness=10 && rm -rf /tmp/x"),
            Some("rm")
        );
        assert_eq!(tool.disallowed_command("cat log | python -c 'pass'"), None);
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let tool = BashTool::new(vec![]);
        assert_eq!(tool.disallowed_command("anything goes; really"), None);
    }

    #[tokio::test]
    async fn execute_echo() {
        let tool = BashTool::new(vec![]);
        let result = tool
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure_with_output() {
        let tool = BashTool::new(vec![]);
        let result = tool
            .execute(serde_json::json!({"command": "echo partial; exit 3"}))
            .await
            .unwrap();
        assert!(!result.is_success());
        let content = result.to_message_content();
        assert!(content.contains("[exit code: 3]"));
        assert!(content.contains("partial"));
    }

    #[tokio::test]
    async fn blocked_command() {
        let tool = BashTool::new(vec!["ls".into()]);
        let result = tool.execute(serde_json::json!({"command": "rm -rf /"})).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let tool = BashTool::new(vec![]);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
