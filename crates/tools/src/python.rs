//! Python tool: run a snippet with the configured interpreter.

use async_trait::async_trait;
use kerneltune_core::error::ToolError;
use kerneltune_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

const NAME: &str = "python_execute";

pub struct PythonTool {
    interpreter: String,
}

impl PythonTool {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute Python code and return what it prints."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to run"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;

        debug!(interpreter = %self.interpreter, bytes = code.len(), "Executing Python code");

        let output = Command::new(&self.interpreter)
            .args(["-c", code])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("{}: {e}", self.interpreter),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(ToolResult::success(stdout.trim()))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(exit_code = code, "Python code failed");
            Ok(ToolResult::failure(
                format!("[exit code: {code}]\n{stdout}\n{stderr}").trim(),
            ))
        }
    }
}
