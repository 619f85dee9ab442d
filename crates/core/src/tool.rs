//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are how the model acts on the machine under tuning: run shell
//! commands (`sysctl -w`, the training job), edit files, execute Python.
//! The [`ToolRegistry`] is the dispatcher the tuning loop talks to.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution: an output on success, an error on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { output: String },
    Failure { error: String },
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success { output: output.into() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Render the result as the content of a tool message.
    pub fn to_message_content(&self) -> String {
        match self {
            Self::Success { output } => output.clone(),
            Self::Failure { error } => format!("Error: {error}"),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (bash_execute, file_editor, python_execute) implements this
/// trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bash_execute").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// Soft failures (a command exiting non-zero) are `Ok(ToolResult::Failure)`;
    /// anything that prevented the tool from running at all is an `Err`.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The tuning loop uses this to:
/// 1. Get tool definitions to send to the LLM (in name order)
/// 2. Dispatch tool calls the LLM requests
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Bound every dispatch by `timeout`. A zero duration means no bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call, surfacing errors.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let run = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: limit.as_secs(),
                })?,
            None => run.await,
        };

        outcome.unwrap_or_else(|panic| Err(ToolError::Panicked(panic_message(&*panic))))
    }

    /// Execute a tool call and fold every error into a failure result.
    ///
    /// Never returns an error: unknown tools, tool errors, timeouts and
    /// panics all come back as [`ToolResult::Failure`].
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self.execute(call).await {
            Ok(result) => {
                debug!(tool = %call.name, success = result.is_success(), "Tool dispatched");
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failure(e.to_string())
            }
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            match arguments["text"].as_str() {
                Some(text) => Ok(ToolResult::success(text)),
                None => Err(ToolError::InvalidArguments("Missing 'text' argument".into())),
            }
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str { "boom" }
        fn description(&self) -> &str { "Always panics" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            panic!("tool blew up");
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { "slow" }
        fn description(&self) -> &str { "Sleeps for a minute" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolResult::success("done"))
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn result_content_rendering() {
        assert_eq!(ToolResult::success("fine").to_message_content(), "fine");
        assert_eq!(ToolResult::failure("bad").to_message_content(), "Error: bad");
        assert!(!ToolResult::failure("bad").is_success());
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_definitions_are_name_ordered() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SlowTool));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(PanickingTool));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["boom", "echo", "slow"]);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute(&call("echo", serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("hello world"));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute(&call("nonexistent", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn dispatch_folds_errors_into_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry.dispatch(&call("echo", serde_json::json!({}))).await;
        match result {
            ToolResult::Failure { error } => assert!(error.contains("Missing 'text'")),
            other => panic!("expected failure, got {other:?}"),
        }

        let result = registry.dispatch(&call("ghost", serde_json::json!({}))).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn dispatch_contains_panics() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PanickingTool));

        let result = registry.dispatch(&call("boom", serde_json::json!({}))).await;
        match result {
            ToolResult::Failure { error } => assert!(error.contains("tool blew up")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_times_out() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(5));
        registry.register(Box::new(SlowTool));

        let err = registry
            .execute(&call("slow", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_secs: 5, .. }));
    }

    #[tokio::test]
    async fn zero_timeout_leaves_dispatch_unbounded() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::ZERO);
        registry.register(Box::new(EchoTool));

        let result = registry
            .dispatch(&call("echo", serde_json::json!({"text": "hi"})))
            .await;
        assert_eq!(result, ToolResult::success("hi"));
    }
}
