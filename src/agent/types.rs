//! Run results, execution log and errors of the agent loop.

use serde::Serialize;
use thiserror::Error;

use super::conversation::HistoryError;
use crate::llm::{ChatMessage, LlmError, TokenUsage};

/// Errors that abort a run. Tool failures never show up here.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("LLM returned empty response")]
    EmptyResponse,

    #[error("Max iterations ({0}) reached without completion")]
    MaxIterations(usize),

    #[error("conversation history out of sync: {0}")]
    History(#[from] HistoryError),
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer text from the model
    pub output: String,

    /// Full message history, starting with the prompt
    pub history: Vec<ChatMessage>,

    /// Tool calls, tool results and the final response, in order
    pub log: Vec<RunLogEntry>,

    /// Token usage summed over every request
    pub usage: TokenUsage,

    /// Number of requests sent to the provider
    pub iterations: usize,
}

/// A single entry in the run execution log.
#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    pub entry_type: LogEntryType,

    /// Content of the entry, truncated for long tool output
    pub content: String,
}

impl RunLogEntry {
    pub fn new(entry_type: LogEntryType, content: String) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            entry_type,
            content,
        }
    }
}

/// Types of log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    /// Tool is being called
    ToolCall,
    /// Tool returned a result
    ToolResult,
    /// Agent produced final response
    Response,
}
