//! File editor tool: read files, write files and list directories.

use async_trait::async_trait;
use kerneltune_core::error::ToolError;
use kerneltune_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

const NAME: &str = "file_editor";

#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum FileOperation {
    Read { path: String },
    Write { path: String, content: String },
    List { path: String },
}

#[derive(Debug, Default)]
pub struct FileEditorTool;

impl FileEditorTool {
    pub fn new() -> Self {
        Self
    }

    async fn read(path: &str) -> ToolResult {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => ToolResult::success(content),
            Err(e) => ToolResult::failure(format!("Failed to read {path}: {e}")),
        }
    }

    async fn write(path: &str, content: &str) -> ToolResult {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolResult::failure(format!("Failed to create {}: {e}", parent.display()));
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => ToolResult::success(format!("Wrote {} bytes to {path}", content.len())),
            Err(e) => ToolResult::failure(format!("Failed to write {path}: {e}")),
        }
    }

    async fn list(path: &str) -> ToolResult {
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) => return ToolResult::failure(format!("Failed to list {path}: {e}")),
        };

        let mut entries = Vec::new();
        loop {
            match dir.next_entry().await {
                Ok(Some(entry)) => {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        name.push('/');
                    }
                    entries.push(name);
                }
                Ok(None) => break,
                Err(e) => return ToolResult::failure(format!("Failed to list {path}: {e}")),
            }
        }

        entries.sort();
        ToolResult::success(entries.join("\n"))
    }
}

#[async_trait]
impl Tool for FileEditorTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read and write files and view directory contents."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["read", "write", "list"],
                    "description": "What to do with the path"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write (write only)"
                }
            },
            "required": ["operation", "path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let op: FileOperation = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        debug!(?op, "File editor operation");

        Ok(match op {
            FileOperation::Read { path } => Self::read(&path).await,
            FileOperation::Write { path, content } => Self::write(&path, &content).await,
            FileOperation::List { path } => Self::list(&path).await,
        })
    }
}
