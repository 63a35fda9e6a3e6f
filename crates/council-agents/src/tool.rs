use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::grounding::{AgentHandle, AgentSpec, GroundingBackend};
use crate::model::ToolSpec;

/// Name of the single argument every research tool takes.
pub const SUBJECT_PARAMETER: &str = "stock_name";

/// A research capability a participant may call. Mockable for testing.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn invoke(&self, subject: &str) -> Result<String, ToolError>;
}

/// Function definition advertised to the model for `invoker`.
pub fn tool_spec(invoker: &dyn ToolInvoker) -> ToolSpec {
    ToolSpec {
        name: invoker.name().to_string(),
        description: invoker.description().to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                SUBJECT_PARAMETER: {
                    "type": "string",
                    "description": "Name or ticker of the stock to research"
                }
            },
            "required": [SUBJECT_PARAMETER]
        }),
    }
}

/// What an ephemeral research agent is told and asked. `{subject}` in either
/// template is replaced with the stock under study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchBrief {
    pub name: String,
    pub description: String,
    pub agent_instructions: String,
    pub query: String,
}

impl ResearchBrief {
    pub fn instructions_for(&self, subject: &str) -> String {
        self.agent_instructions.replace("{subject}", subject)
    }

    pub fn query_for(&self, subject: &str) -> String {
        self.query.replace("{subject}", subject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchTimeouts {
    /// Deadline for thread creation, the run, and reading the answer.
    pub research: Duration,
    /// Deadline for deleting the agent afterwards.
    pub cleanup: Duration,
}

impl Default for ResearchTimeouts {
    fn default() -> Self {
        Self {
            research: Duration::from_secs(180),
            cleanup: Duration::from_secs(15),
        }
    }
}

/// A tool that answers by running a disposable web-grounded agent.
///
/// Each call creates its own remote agent and always attempts to delete it,
/// whether the research succeeded, failed, or ran out of time. The call runs
/// as its own task, so dropping the caller (turn deadline, cancellation) cuts
/// the research short but still deletes the agent.
pub struct GroundedResearchTool {
    inner: Arc<ResearchRunner>,
}

struct ResearchRunner {
    brief: ResearchBrief,
    agent_model: String,
    backend: Arc<dyn GroundingBackend>,
    timeouts: ResearchTimeouts,
}

impl GroundedResearchTool {
    pub fn new(
        brief: ResearchBrief,
        agent_model: impl Into<String>,
        backend: Arc<dyn GroundingBackend>,
        timeouts: ResearchTimeouts,
    ) -> Self {
        Self {
            inner: Arc::new(ResearchRunner {
                brief,
                agent_model: agent_model.into(),
                backend,
                timeouts,
            }),
        }
    }
}

impl ResearchRunner {
    async fn run(&self, subject: &str, abandoned: CancellationToken) -> Result<String, ToolError> {
        let spec = AgentSpec {
            model: self.agent_model.clone(),
            name: format!("{}_tool_agent", self.brief.name),
            instructions: self.brief.instructions_for(subject),
            tools: self.backend.grounding_tools(),
        };
        let agent = self.backend.create_agent(&spec).await?;

        let result = tokio::select! {
            outcome = tokio::time::timeout(self.timeouts.research, self.research(&agent, subject)) => {
                outcome.unwrap_or(Err(ToolError::Timeout(self.timeouts.research)))
            }
            _ = abandoned.cancelled() => {
                debug!(tool = %self.brief.name, agent_id = %agent.id, "Research abandoned by caller");
                Err(ToolError::Abandoned)
            }
        };

        self.release(&agent).await;
        result
    }

    async fn research(&self, agent: &AgentHandle, subject: &str) -> Result<String, ToolError> {
        let thread = self.backend.create_thread().await?;
        self.backend
            .post_message(&thread, "user", &self.brief.query_for(subject))
            .await?;

        let run = self.backend.run_and_process(&thread, agent).await?;
        if !run.succeeded() {
            return Err(ToolError::RunFailed {
                detail: run
                    .last_error
                    .unwrap_or_else(|| "no error detail".to_string()),
                run_id: run.id,
                status: run.status,
            });
        }

        let messages = self.backend.list_messages(&thread).await?;
        messages
            .into_iter()
            .find(|m| m.role == "assistant" && !m.text.trim().is_empty())
            .map(|m| m.text)
            .ok_or(ToolError::EmptyResponse)
    }

    async fn release(&self, agent: &AgentHandle) {
        match tokio::time::timeout(self.timeouts.cleanup, self.backend.delete_agent(agent)).await
        {
            Ok(Ok(())) => debug!(tool = %self.brief.name, agent_id = %agent.id, "Deleted research agent"),
            Ok(Err(e)) => {
                warn!(tool = %self.brief.name, agent_id = %agent.id, error = %e, "Failed to delete research agent")
            }
            Err(_) => {
                warn!(tool = %self.brief.name, agent_id = %agent.id, "Timed out deleting research agent")
            }
        }
    }
}

#[async_trait]
impl ToolInvoker for GroundedResearchTool {
    fn name(&self) -> &str {
        &self.inner.brief.name
    }

    fn description(&self) -> &str {
        &self.inner.brief.description
    }

    async fn invoke(&self, subject: &str) -> Result<String, ToolError> {
        info!(tool = %self.inner.brief.name, subject, "Running grounded research");

        let abandoned = CancellationToken::new();
        let _guard = abandoned.clone().drop_guard();
        let runner = Arc::clone(&self.inner);
        let subject = subject.to_string();

        tokio::spawn(async move { runner.run(&subject, abandoned).await })
            .await
            .map_err(|e| ToolError::Aborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GroundingCall, StubGrounding};

    fn brief() -> ResearchBrief {
        ResearchBrief {
            name: "news_analysis".to_string(),
            description: "Latest news".to_string(),
            agent_instructions: "Focus on the latest news highlights for the stock {subject}."
                .to_string(),
            query: "Retrieve the latest news articles and summaries about {subject}.".to_string(),
        }
    }

    fn tool(backend: Arc<StubGrounding>) -> GroundedResearchTool {
        GroundedResearchTool::new(brief(), "gpt-4o", backend, ResearchTimeouts::default())
    }

    #[test]
    fn brief_renders_subject() {
        let b = brief();
        assert_eq!(
            b.query_for("MSFT"),
            "Retrieve the latest news articles and summaries about MSFT."
        );
        assert!(b.instructions_for("MSFT").ends_with("stock MSFT."));
    }

    #[test]
    fn spec_requires_stock_name() {
        let backend = Arc::new(StubGrounding::answering("n/a"));
        let spec = tool_spec(&tool(backend));
        assert_eq!(spec.name, "news_analysis");
        assert_eq!(spec.parameters["required"][0], SUBJECT_PARAMETER);
    }

    #[tokio::test]
    async fn invoke_runs_full_sequence_and_cleans_up() {
        let backend = Arc::new(StubGrounding::answering("Chip demand lifts NVDA."));
        let result = tool(backend.clone()).invoke("NVDA").await.unwrap();
        assert_eq!(result, "Chip demand lifts NVDA.");

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                GroundingCall::CreateAgent {
                    name: "news_analysis_tool_agent".to_string(),
                    instructions: "Focus on the latest news highlights for the stock NVDA."
                        .to_string(),
                },
                GroundingCall::CreateThread,
                GroundingCall::PostMessage {
                    role: "user".to_string(),
                    content: "Retrieve the latest news articles and summaries about NVDA."
                        .to_string(),
                },
                GroundingCall::Run,
                GroundingCall::ListMessages,
                GroundingCall::DeleteAgent("agent_1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_run_still_deletes_agent() {
        let backend = Arc::new(StubGrounding::answering("unused").with_run_status("failed"));
        let err = tool(backend.clone()).invoke("NVDA").await.unwrap_err();
        assert!(matches!(err, ToolError::RunFailed { .. }));
        assert_eq!(backend.deleted_agents(), vec!["agent_1".to_string()]);
    }

    #[tokio::test]
    async fn list_failure_still_deletes_agent() {
        let backend = Arc::new(StubGrounding::answering("unused").failing_list());
        let err = tool(backend.clone()).invoke("NVDA").await.unwrap_err();
        assert!(matches!(err, ToolError::Status { status: 503, .. }));
        assert_eq!(backend.deleted_agents().len(), 1);
    }

    #[tokio::test]
    async fn create_agent_failure_skips_cleanup() {
        let backend = Arc::new(StubGrounding::answering("unused").failing_create());
        assert!(tool(backend.clone()).invoke("NVDA").await.is_err());
        assert!(backend.deleted_agents().is_empty());
    }

    #[tokio::test]
    async fn empty_answer_is_error() {
        let backend = Arc::new(StubGrounding::answering("   "));
        let err = tool(backend.clone()).invoke("NVDA").await.unwrap_err();
        assert!(matches!(err, ToolError::EmptyResponse));
        assert_eq!(backend.deleted_agents().len(), 1);
    }

    #[tokio::test]
    async fn research_deadline_still_deletes_agent() {
        let backend = Arc::new(
            StubGrounding::answering("late").with_run_delay(Duration::from_millis(500)),
        );
        let tool = GroundedResearchTool::new(
            brief(),
            "gpt-4o",
            backend.clone(),
            ResearchTimeouts {
                research: Duration::from_millis(50),
                cleanup: Duration::from_secs(1),
            },
        );
        let err = tool.invoke("NVDA").await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
        assert_eq!(err.to_string(), "Research timed out after 50ms");
        assert_eq!(backend.deleted_agents(), vec!["agent_1".to_string()]);
    }

    #[tokio::test]
    async fn dropped_call_still_deletes_agent() {
        let backend = Arc::new(
            StubGrounding::answering("late").with_run_delay(Duration::from_secs(30)),
        );
        let tool = tool(backend.clone());
        let call = tokio::time::timeout(Duration::from_millis(50), tool.invoke("NVDA")).await;
        assert!(call.is_err());

        backend.wait_for_deletions(1, Duration::from_secs(2)).await;
        assert_eq!(backend.created_agents(), 1);
        assert_eq!(backend.deleted_agents(), vec!["agent_1".to_string()]);
    }

    #[tokio::test]
    async fn delete_failure_does_not_mask_answer() {
        let backend = Arc::new(StubGrounding::answering("fine").failing_delete());
        let result = tool(backend).invoke("NVDA").await.unwrap();
        assert_eq!(result, "fine");
    }
}
