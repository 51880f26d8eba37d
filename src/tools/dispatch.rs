//! Routes a model's tool call to the registered tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::{ToolError, ToolRegistry};

/// Executes tool calls by name. Never fails: every error becomes the result text.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    workspace: PathBuf,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            workspace: workspace.into(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Run `name` with the serialized JSON `raw_arguments` and return its output,
    /// or a description of what went wrong.
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> String {
        match self.try_execute(name, raw_arguments).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Tool '{}' failed: {}", name, e);
                e.to_string()
            }
        }
    }

    async fn try_execute(&self, name: &str, raw_arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .registry
            .lookup(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let args = parse_raw_arguments(raw_arguments)?;
        tool.execute(args, &self.workspace).await
    }
}

/// Models sometimes send an empty string for a call without arguments.
fn parse_raw_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidInput(e.to_string()))
}
