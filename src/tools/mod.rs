//! Tools the model can call, and the registry that holds them.
//!
//! Every tool implements [`Tool`]. The registry stores them by capability
//! (`Arc<dyn Tool>`), so adding a tool never touches the agent loop.

mod dispatch;
mod file;
mod terminal;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use dispatch::ToolDispatcher;
pub use file::{ReadFile, WriteFile};
pub use terminal::Bash;

/// Failures a tool reports back to the model as text.
///
/// None of these abort a run: the dispatcher renders them with `Display`
/// and hands the string to the model as the call's result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file_path cannot contain '..' for security reasons: {0}")]
    PathTraversal(String),

    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("error {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {0} seconds")]
    TimedOut(u64),
}

impl ToolError {
    pub fn io(action: &'static str, source: std::io::Error) -> Self {
        ToolError::Io { action, source }
    }
}

/// A capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with already-decoded JSON arguments.
    ///
    /// `workspace` is the base for relative paths and the shell's working directory.
    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError>;
}

/// Decode a tool's typed arguments, mapping failures to [`ToolError::InvalidInput`].
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// Provider-facing description of one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            schema_type: "function".to_string(),
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// The fixed set of tools available to one run.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `Read`, `Write` and `Bash` tools.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(ReadFile);
        registry.register(WriteFile);
        registry.register(Bash);
        registry
    }

    /// Add a tool. A tool with the same name is replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!("Tool '{}' re-registered, previous definition replaced", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Snapshot of every registered tool, in no particular order.
    pub fn list_all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// Schemas for every tool, sorted by name so request payloads are stable.
    pub fn export_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema::function(t.name(), t.description(), t.parameters_schema()))
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
