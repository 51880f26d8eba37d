//! Agent module - the tool-calling conversation loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the history with the user prompt
//! 2. Call the LLM with the history and the available tools
//! 3. If the LLM requests tool calls, execute them in order and feed the results back
//! 4. Repeat until the LLM produces a final response

mod agent_loop;
mod conversation;
mod types;

pub use agent_loop::Agent;
pub use conversation::{Conversation, HistoryError};
pub use types::{AgentError, AgentRun, LogEntryType, RunLogEntry};
