use thiserror::Error;

/// Provider failures. All of them are fatal for the run that hit them.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to LLM provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM provider returned an error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from LLM provider: {0}")]
    InvalidResponse(String),

    #[error("LLM provider returned no choices")]
    EmptyResponse,
}

impl LlmError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::EmptyResponse => false,
        }
    }
}
