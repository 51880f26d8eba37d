//! Core agent loop implementation.

use std::sync::Arc;

use futures::future::join_all;
use tracing::Instrument;
use uuid::Uuid;

use super::conversation::Conversation;
use super::types::{AgentError, AgentRun, LogEntryType, RunLogEntry};
use crate::config::Config;
use crate::llm::{LlmClient, LlmError, OpenRouterClient, TokenUsage, ToolCall};
use crate::tools::{ToolDispatcher, ToolRegistry};

/// The tool-calling agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    model: String,
    max_iterations: Option<usize>,
    parallel_tool_calls: bool,
}

impl Agent {
    /// Create an agent talking to OpenRouter with the built-in tools.
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let llm = Arc::new(OpenRouterClient::from_config(config)?);
        let registry = Arc::new(ToolRegistry::with_builtin_tools());
        Ok(Self::with_parts(config, llm, registry))
    }

    /// Create an agent from an explicit client and tool registry.
    pub fn with_parts(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            llm,
            dispatcher: ToolDispatcher::new(registry, config.workspace_path.clone()),
            model: config.default_model.clone(),
            max_iterations: config.max_iterations,
            parallel_tool_calls: config.parallel_tool_calls,
        }
    }

    /// Override the model used for this agent's requests.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one conversation from `prompt` to the model's final answer.
    ///
    /// Provider failures abort the run. Tool failures are fed back to the
    /// model as the call's result and the loop carries on.
    pub async fn run_task(&self, prompt: &str) -> Result<AgentRun, AgentError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_run", %run_id, model = %self.model);
        self.run_loop(prompt).instrument(span).await
    }

    async fn run_loop(&self, prompt: &str) -> Result<AgentRun, AgentError> {
        let mut conversation = Conversation::new(prompt);
        let mut log = Vec::new();
        let mut usage = TokenUsage::default();

        // Get tool schemas for LLM
        let tool_schemas = self.dispatcher.registry().export_schemas();

        let mut iteration = 0;
        loop {
            if let Some(max) = self.max_iterations {
                if iteration >= max {
                    return Err(AgentError::MaxIterations(max));
                }
            }
            iteration += 1;
            tracing::debug!("Agent iteration {}", iteration);

            let response = self
                .llm
                .chat_completion(
                    &self.model,
                    conversation.request_messages()?,
                    Some(&tool_schemas),
                )
                .await?;

            if let Some(u) = &response.usage {
                usage = usage.add(u);
            }

            let tool_calls = response.requested_calls().to_vec();

            // No tool calls - this is the final response
            if tool_calls.is_empty() {
                let content = response.content.ok_or(AgentError::EmptyResponse)?;
                log.push(RunLogEntry::new(
                    LogEntryType::Response,
                    truncate_for_log(&content, 2000),
                ));
                tracing::info!(
                    iterations = iteration,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Agent finished"
                );
                return Ok(AgentRun {
                    output: content,
                    history: conversation.into_messages(),
                    log,
                    usage,
                    iterations: iteration,
                });
            }

            conversation.record_tool_calls(response.content, tool_calls.clone())?;

            let results = self.execute_batch(&tool_calls, &mut log).await;
            for (tool_call, result) in tool_calls.iter().zip(results) {
                conversation.record_tool_result(&tool_call.id, result)?;
            }
        }
    }

    /// Execute one batch of tool calls; results come back in request order.
    async fn execute_batch(
        &self,
        tool_calls: &[ToolCall],
        log: &mut Vec<RunLogEntry>,
    ) -> Vec<String> {
        if self.parallel_tool_calls && tool_calls.len() > 1 {
            for tool_call in tool_calls {
                log.push(log_call(tool_call));
            }
            let results = join_all(
                tool_calls
                    .iter()
                    .map(|c| self.dispatcher.execute(&c.function.name, &c.function.arguments)),
            )
            .await;
            for result in &results {
                log.push(RunLogEntry::new(
                    LogEntryType::ToolResult,
                    truncate_for_log(result, 1000),
                ));
            }
            return results;
        }

        let mut results = Vec::with_capacity(tool_calls.len());
        for tool_call in tool_calls {
            log.push(log_call(tool_call));
            let result = self
                .dispatcher
                .execute(&tool_call.function.name, &tool_call.function.arguments)
                .await;
            log.push(RunLogEntry::new(
                LogEntryType::ToolResult,
                truncate_for_log(&result, 1000),
            ));
            results.push(result);
        }
        results
    }
}

fn log_call(tool_call: &ToolCall) -> RunLogEntry {
    tracing::info!(
        "Tool call: {}({})",
        tool_call.function.name,
        tool_call.function.arguments
    );
    RunLogEntry::new(
        LogEntryType::ToolCall,
        format!(
            "Calling tool: {} with args: {}",
            tool_call.function.name, tool_call.function.arguments
        ),
    )
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
