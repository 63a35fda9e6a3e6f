use std::time::Duration;

use thiserror::Error;

/// Failure of a single grounded research call.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Grounding HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Grounding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Grounding run {run_id} ended with status {status}: {detail}")]
    RunFailed {
        run_id: String,
        status: String,
        detail: String,
    },

    #[error("Grounding service returned no answer")]
    EmptyResponse,

    #[error("Malformed grounding response: {0}")]
    Malformed(String),

    #[error("Research timed out after {0:?}")]
    Timeout(Duration),

    #[error("Research abandoned before it finished")]
    Abandoned,

    #[error("Research task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tool {tool} failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Model backend error: {0}")]
    ModelBackend(String),

    #[error("Model requested unknown capability: {0}")]
    UnknownCapability(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Conversation cancelled")]
    Cancelled,

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Model backend HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether the error originated in a research tool rather than the model.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, AgentError::Tool { .. })
    }
}
