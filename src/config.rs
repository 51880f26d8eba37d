//! Configuration management for the agent.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `OPENROUTER_BASE_URL` - Optional. Base URL of the OpenAI-compatible API. Defaults to `https://openrouter.ai/api/v1`.
//! - `DEFAULT_MODEL` - Optional. The LLM model to use. Defaults to `anthropic/claude-haiku-4.5`.
//! - `WORKSPACE_PATH` - Optional. Existing base directory for relative tool paths, canonicalized on load. Defaults to current directory.
//! - `MAX_ITERATIONS` - Optional. Cap on request cycles. Unbounded when unset.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Per-request HTTP timeout. Defaults to `120`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient provider failures. Defaults to `0`.
//! - `PARALLEL_TOOL_CALLS` - Optional. Run a batch of tool calls concurrently. Defaults to `false`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-haiku-4.5";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Base URL of the chat-completions API
    pub base_url: String,

    /// LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Base directory for relative tool paths and shell commands
    pub workspace_path: PathBuf,

    /// Maximum request cycles for one run; `None` runs until a final answer
    pub max_iterations: Option<usize>,

    /// Timeout applied to each provider request
    pub request_timeout: Duration,

    /// How many times a transient provider failure is retried
    pub max_retries: u32,

    /// Execute the tool calls of one batch concurrently
    pub parallel_tool_calls: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let base_url = lookup("OPENROUTER_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidValue("OPENROUTER_BASE_URL".to_string(), e.to_string())
        })?;

        let default_model = lookup("DEFAULT_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        // Tool paths are joined onto the workspace and rejected if they contain
        // `..`, so the workspace itself must be absolute and normalized.
        let workspace_path = match lookup("WORKSPACE_PATH").filter(|v| !v.trim().is_empty()) {
            Some(raw) => std::fs::canonicalize(&raw).map_err(|e| {
                ConfigError::InvalidValue("WORKSPACE_PATH".to_string(), format!("{}: {}", raw, e))
            })?,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let max_iterations = lookup("MAX_ITERATIONS")
            .map(|v| parse_number::<usize>("MAX_ITERATIONS", &v))
            .transpose()?;

        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .map(|v| parse_number::<u64>("REQUEST_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));

        let max_retries = lookup("LLM_MAX_RETRIES")
            .map(|v| parse_number::<u32>("LLM_MAX_RETRIES", &v))
            .transpose()?
            .unwrap_or(0);

        let parallel_tool_calls = lookup("PARALLEL_TOOL_CALLS")
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("PARALLEL_TOOL_CALLS".to_string(), e))
            })
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            api_key,
            base_url,
            default_model,
            workspace_path,
            max_iterations,
            request_timeout,
            max_retries,
            parallel_tool_calls,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model,
            workspace_path,
            max_iterations: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: 0,
            parallel_tool_calls: false,
        }
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
