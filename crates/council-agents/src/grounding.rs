use async_trait::async_trait;
use serde::Serialize;

use crate::error::ToolError;

/// Blueprint for an ephemeral research agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instructions: String,
    /// Backend-specific tool definitions, e.g. a web grounding connection.
    pub tools: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub id: String,
}

/// Terminal state of a processed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub id: String,
    pub status: String,
    pub last_error: Option<String>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == "completed"
    }
}

/// A message read back from a research thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: String,
    pub text: String,
}

/// Web-grounded agent execution service. Every research tool call goes through
/// this sequence: create agent, create thread, post message, run, list, delete.
#[async_trait]
pub trait GroundingBackend: Send + Sync {
    /// Tool definitions that give a research agent web grounding.
    fn grounding_tools(&self) -> Vec<serde_json::Value>;

    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, ToolError>;

    async fn create_thread(&self) -> Result<ThreadHandle, ToolError>;

    async fn post_message(
        &self,
        thread: &ThreadHandle,
        role: &str,
        content: &str,
    ) -> Result<(), ToolError>;

    /// Start a run of `agent` on `thread` and wait until it reaches a terminal status.
    async fn run_and_process(
        &self,
        thread: &ThreadHandle,
        agent: &AgentHandle,
    ) -> Result<RunResult, ToolError>;

    /// Messages on the thread, newest first.
    async fn list_messages(&self, thread: &ThreadHandle) -> Result<Vec<ThreadMessage>, ToolError>;

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), ToolError>;
}
