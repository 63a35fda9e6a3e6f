//! Test doubles for the model backend, grounding service, tools and agents.
//!
//! `ScenarioModel` answers by role, reading the participant's system prompt,
//! so a whole roster can share it the way they share a real deployment.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use council_models::{Message, Transcript, TASK_SENDER};
use tokio::sync::Mutex;

use crate::error::{AgentError, ToolError};
use crate::grounding::{
    AgentHandle, AgentSpec, GroundingBackend, RunResult, ThreadHandle, ThreadMessage,
};
use crate::model::{ChatMessage, Completion, CompletionRequest, ModelBackend, ToolCallRequest};
use crate::participant::ConversationalAgent;
use crate::prompts::DECISION_MARKER;
use crate::tool::{ToolInvoker, SUBJECT_PARAMETER};

/// A tool call asking for research on `subject`.
pub fn tool_call(id: &str, name: &str, subject: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::json!({ SUBJECT_PARAMETER: subject }),
    }
}

/// Model backend that replays a fixed script and records every request.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Completion, AgentError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Completion, AgentError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|t| Ok(Completion::Text(t.to_string())))
                .collect(),
        )
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AgentError> {
        self.requests.lock().await.push(request.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::ModelBackend("script exhausted".to_string())))
    }
}

/// Model backend that plays every roster role.
///
/// Analysts call each offered tool once for the task's stock, then summarize.
/// The decision role withholds its call until its `decide_on_turn`-th turn,
/// when it answers with a verdict block and the decision marker.
pub struct ScenarioModel {
    decide_on_turn: Option<usize>,
    verdict_block: bool,
    decision_turns: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScenarioModel {
    /// The decision role never concludes.
    pub fn undecided() -> Self {
        Self {
            decide_on_turn: None,
            verdict_block: true,
            decision_turns: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn deciding_on_turn(turn: usize) -> Self {
        Self {
            decide_on_turn: Some(turn),
            ..Self::undecided()
        }
    }

    /// Decide with the marker only, no structured block.
    pub fn marker_only(mut self) -> Self {
        self.verdict_block = false;
        self
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    fn decision_reply(&self, subject: &str) -> String {
        let turn = self.decision_turns.fetch_add(1, Ordering::SeqCst) + 1;
        if self.decide_on_turn != Some(turn) {
            return format!("Waiting for more research on {subject} before deciding.");
        }
        let mut reply = format!("Momentum and sentiment support {subject}. Invest.\n");
        if self.verdict_block {
            reply.push_str(
                "```json\n{\"verdict\": \"invest\", \"current_price\": \"$250.10\", \
                 \"rationale\": \"Strong momentum\"}\n```\n",
            );
        }
        reply.push_str(DECISION_MARKER);
        reply
    }
}

fn system_prompt(request: &CompletionRequest) -> &str {
    request
        .messages
        .iter()
        .find_map(|m| match m {
            ChatMessage::System(s) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or_default()
}

fn task_subject(request: &CompletionRequest) -> String {
    request
        .messages
        .iter()
        .find_map(|m| match m {
            ChatMessage::User { name, content } if name == TASK_SENDER => {
                Some(content.lines().next().unwrap_or_default().trim().to_string())
            }
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelBackend for ScenarioModel {
    fn name(&self) -> &str {
        "scenario"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AgentError> {
        self.requests.lock().await.push(request.clone());
        let subject = task_subject(request);

        let after_tools = matches!(request.messages.last(), Some(ChatMessage::ToolResult { .. }));
        if !request.tools.is_empty() && !after_tools {
            let calls = request
                .tools
                .iter()
                .enumerate()
                .map(|(i, t)| tool_call(&format!("call_{i}"), &t.name, &subject))
                .collect();
            return Ok(Completion::ToolCalls(calls));
        }

        let prompt = system_prompt(request);
        let text = if prompt.contains("Decision Agent") {
            self.decision_reply(&subject)
        } else if prompt.contains("Stock Price Trends Agent") {
            format!("{subject} price trend summary.")
        } else if prompt.contains("News Agent") {
            format!("{subject} news summary.")
        } else if prompt.contains("Market Sentiment Agent") {
            format!("{subject} sentiment summary.")
        } else {
            return Err(AgentError::ModelBackend("unknown role".to_string()));
        };
        Ok(Completion::Text(text))
    }
}

/// Tool that always returns the same text and records what it was asked.
pub struct StaticTool {
    name: String,
    output: String,
    subjects: Mutex<Vec<String>>,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            output: output.to_string(),
            subjects: Mutex::new(Vec::new()),
        }
    }

    pub async fn subjects(&self) -> Vec<String> {
        self.subjects.lock().await.clone()
    }
}

#[async_trait]
impl ToolInvoker for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "static test tool"
    }

    async fn invoke(&self, subject: &str) -> Result<String, ToolError> {
        self.subjects.lock().await.push(subject.to_string());
        Ok(self.output.clone())
    }
}

/// Tool that always fails with the error `make` builds.
pub struct FailingTool {
    name: String,
    make: fn() -> ToolError,
}

impl FailingTool {
    pub fn new(name: &str, make: fn() -> ToolError) -> Self {
        Self {
            name: name.to_string(),
            make,
        }
    }
}

#[async_trait]
impl ToolInvoker for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "failing test tool"
    }

    async fn invoke(&self, _subject: &str) -> Result<String, ToolError> {
        Err((self.make)())
    }
}

/// Agent that answers with its name and the transcript length.
pub struct EchoAgent {
    name: String,
}

impl EchoAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ConversationalAgent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, transcript: &Transcript) -> Result<Message, AgentError> {
        Ok(Message::text(
            &self.name,
            format!("{} speaking after {} messages", self.name, transcript.len()),
        ))
    }
}

pub struct FailingAgent {
    name: String,
}

impl FailingAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ConversationalAgent for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, _transcript: &Transcript) -> Result<Message, AgentError> {
        Err(AgentError::ModelBackend("scripted failure".to_string()))
    }
}

/// Agent that sleeps before answering.
pub struct StallingAgent {
    name: String,
    delay: Duration,
}

impl StallingAgent {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl ConversationalAgent for StallingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, _transcript: &Transcript) -> Result<Message, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(Message::text(&self.name, "finally"))
    }
}

/// One recorded grounding call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingCall {
    CreateAgent { name: String, instructions: String },
    CreateThread,
    PostMessage { role: String, content: String },
    Run,
    ListMessages,
    DeleteAgent(String),
}

/// In-memory grounding service with switchable failures.
pub struct StubGrounding {
    answer: String,
    run_status: String,
    run_delay: Option<Duration>,
    fail_create: bool,
    fail_list: bool,
    fail_delete: bool,
    next_id: AtomicUsize,
    calls: StdMutex<Vec<GroundingCall>>,
}

impl StubGrounding {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            run_status: "completed".to_string(),
            run_delay: None,
            fail_create: false,
            fail_list: false,
            fail_delete: false,
            next_id: AtomicUsize::new(0),
            calls: StdMutex::new(Vec::new()),
        }
    }

    pub fn with_run_status(mut self, status: &str) -> Self {
        self.run_status = status.to_string();
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<GroundingCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn created_agents(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GroundingCall::CreateAgent { .. }))
            .count()
    }

    pub fn deleted_agents(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GroundingCall::DeleteAgent(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` agents were deleted or `limit` elapsed.
    /// Cleanup of an abandoned research call finishes on its own task.
    pub async fn wait_for_deletions(&self, count: usize, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        while self.deleted_agents().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn record(&self, call: GroundingCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn unavailable() -> ToolError {
        ToolError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl GroundingBackend for StubGrounding {
    fn grounding_tools(&self) -> Vec<serde_json::Value> {
        vec![serde_json::json!({ "type": "bing_grounding" })]
    }

    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, ToolError> {
        if self.fail_create {
            return Err(Self::unavailable());
        }
        self.record(GroundingCall::CreateAgent {
            name: spec.name.clone(),
            instructions: spec.instructions.clone(),
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AgentHandle {
            id: format!("agent_{n}"),
        })
    }

    async fn create_thread(&self) -> Result<ThreadHandle, ToolError> {
        self.record(GroundingCall::CreateThread);
        Ok(ThreadHandle {
            id: "thread_1".to_string(),
        })
    }

    async fn post_message(
        &self,
        _thread: &ThreadHandle,
        role: &str,
        content: &str,
    ) -> Result<(), ToolError> {
        self.record(GroundingCall::PostMessage {
            role: role.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn run_and_process(
        &self,
        _thread: &ThreadHandle,
        _agent: &AgentHandle,
    ) -> Result<RunResult, ToolError> {
        self.record(GroundingCall::Run);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RunResult {
            id: "run_1".to_string(),
            status: self.run_status.clone(),
            last_error: (self.run_status != "completed").then(|| "rate limited".to_string()),
        })
    }

    async fn list_messages(&self, _thread: &ThreadHandle) -> Result<Vec<ThreadMessage>, ToolError> {
        self.record(GroundingCall::ListMessages);
        if self.fail_list {
            return Err(Self::unavailable());
        }
        Ok(vec![
            ThreadMessage {
                role: "assistant".to_string(),
                text: self.answer.clone(),
            },
            ThreadMessage {
                role: "user".to_string(),
                text: "query".to_string(),
            },
        ])
    }

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), ToolError> {
        self.record(GroundingCall::DeleteAgent(agent.id.clone()));
        if self.fail_delete {
            return Err(Self::unavailable());
        }
        Ok(())
    }
}
