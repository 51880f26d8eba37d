//! # Tool Agent
//!
//! A minimal coding agent: one prompt, one model, three local tools.
//!
//! This library provides:
//! - A tool-calling agent loop driven by a chat-completion model
//! - Built-in `Read`, `Write` and `Bash` tools behind a registry and dispatcher
//! - Integration with OpenRouter (or any OpenAI-compatible endpoint) for LLM access
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Seed the conversation with the user prompt
//! 2. Call the LLM with the conversation and the tool schemas
//! 3. Execute any requested tool calls, in order, and append their results
//! 4. Repeat until the LLM answers without tool calls
//!
//! Tool failures are returned to the model as text; provider failures end the run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tool_agent::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::new(&config)?;
//! let run = agent.run_task("Create a hello world script").await?;
//! println!("{}", run.output);
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
