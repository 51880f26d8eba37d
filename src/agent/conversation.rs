//! Append-only message history for a single run.

use std::collections::VecDeque;

use thiserror::Error;

use crate::llm::{ChatMessage, ToolCall};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("tool calls still awaiting results: {0:?}")]
    Unanswered(Vec<String>),

    #[error("tool result for '{got}' does not answer the next outstanding call ({expected:?})")]
    OutOfOrder {
        expected: Option<String>,
        got: String,
    },

    #[error("assistant turn recorded without tool calls")]
    EmptyBatch,
}

/// Ordered history that keeps every tool call paired with exactly one result.
///
/// Starts with the user prompt. An assistant turn carrying tool calls opens a
/// batch; its results must then be appended in the same order as the calls
/// before the history can be sent again.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    outstanding: VecDeque<String>,
}

impl Conversation {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            outstanding: VecDeque::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// History to send with the next request. Fails while a batch is unanswered.
    pub fn request_messages(&self) -> Result<&[ChatMessage], HistoryError> {
        if !self.outstanding.is_empty() {
            return Err(HistoryError::Unanswered(
                self.outstanding.iter().cloned().collect(),
            ));
        }
        Ok(&self.messages)
    }

    /// Append the assistant turn requesting `calls`.
    pub fn record_tool_calls(
        &mut self,
        content: Option<String>,
        calls: Vec<ToolCall>,
    ) -> Result<(), HistoryError> {
        if !self.outstanding.is_empty() {
            return Err(HistoryError::Unanswered(
                self.outstanding.iter().cloned().collect(),
            ));
        }
        if calls.is_empty() {
            return Err(HistoryError::EmptyBatch);
        }

        self.outstanding = calls.iter().map(|c| c.id.clone()).collect();
        self.messages
            .push(ChatMessage::assistant_tool_calls(content, calls));
        Ok(())
    }

    /// Append the result for the next outstanding call.
    pub fn record_tool_result(
        &mut self,
        tool_call_id: &str,
        content: impl Into<String>,
    ) -> Result<(), HistoryError> {
        let expected = self.outstanding.front().cloned();
        if expected.as_deref() != Some(tool_call_id) {
            return Err(HistoryError::OutOfOrder {
                expected,
                got: tool_call_id.to_string(),
            });
        }

        self.outstanding.pop_front();
        self.messages
            .push(ChatMessage::tool_result(tool_call_id, content));
        Ok(())
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}
