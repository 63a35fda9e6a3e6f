use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// One entry of the history sent to the completion backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    /// Input authored by someone other than the responding participant.
    User { name: String, content: String },
    /// Earlier output of the responding participant itself.
    Assistant(String),
    /// The participant's own request to run tools.
    ToolCalls(Vec<ToolCallRequest>),
    ToolResult { call_id: String, content: String },
}

/// A function the model may ask to call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// What the model produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// Chat-completion backend shared by all participants. Mockable for testing.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AgentError>;
}
