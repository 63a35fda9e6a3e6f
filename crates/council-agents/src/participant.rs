use std::sync::Arc;

use async_trait::async_trait;
use council_models::{Message, Transcript};
use tracing::{debug, info};

use crate::capability::CapabilitySet;
use crate::error::AgentError;
use crate::model::{ChatMessage, Completion, CompletionRequest, ModelBackend, ToolCallRequest};
use crate::parser::extract_decision;
use crate::tool::SUBJECT_PARAMETER;

/// One seat at the table. Mockable for testing.
#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Produce exactly one new message given everything said so far.
    async fn take_turn(&self, transcript: &Transcript) -> Result<Message, AgentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    /// Completions that may request tools before one must answer in text.
    pub max_tool_rounds: u32,
    /// Ask the model to summarize tool output instead of returning it raw.
    pub reflect_on_tool_use: bool,
    /// Scan the reply for a decision block and attach it.
    pub emits_verdict: bool,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            reflect_on_tool_use: true,
            emits_verdict: false,
        }
    }
}

/// A model-backed role with its own instructions and tools.
pub struct Participant {
    name: String,
    instructions: String,
    capabilities: CapabilitySet,
    backend: Arc<dyn ModelBackend>,
    settings: TurnSettings,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            capabilities: CapabilitySet::empty(),
            backend,
            settings: TurnSettings::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_settings(mut self, settings: TurnSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The transcript as this participant sees it.
    pub fn history(&self, transcript: &Transcript) -> Vec<ChatMessage> {
        let mut history = Vec::with_capacity(transcript.len() + 1);
        history.push(ChatMessage::System(self.instructions.clone()));
        for message in transcript.iter() {
            if message.sender == self.name {
                history.push(ChatMessage::Assistant(message.content.clone()));
            } else {
                history.push(ChatMessage::User {
                    name: message.sender.clone(),
                    content: message.content.clone(),
                });
            }
        }
        history
    }

    fn finish(&self, text: String) -> Message {
        let verdict = if self.settings.emits_verdict {
            extract_decision(&text)
        } else {
            None
        };
        let message = Message::text(&self.name, text);
        match verdict {
            Some(signal) => {
                info!(participant = %self.name, verdict = signal.verdict.label(), "Decision extracted");
                message.with_verdict(signal)
            }
            None => message,
        }
    }

    async fn run_tool(&self, call: &ToolCallRequest) -> Result<String, AgentError> {
        let tool = self
            .capabilities
            .resolve(&call.name)
            .ok_or_else(|| AgentError::UnknownCapability(call.name.clone()))?;
        let subject = subject_argument(call)?;
        debug!(participant = %self.name, tool = %call.name, subject = %subject, "Invoking tool");
        tool.invoke(&subject)
            .await
            .map_err(|source| AgentError::Tool {
                tool: call.name.clone(),
                source,
            })
    }
}

#[async_trait]
impl ConversationalAgent for Participant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, transcript: &Transcript) -> Result<Message, AgentError> {
        let mut messages = self.history(transcript);
        let max_rounds = self.settings.max_tool_rounds;

        for round in 0..=max_rounds {
            let offer_tools = !self.capabilities.is_empty() && round < max_rounds;
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: if offer_tools {
                    self.capabilities.specs()
                } else {
                    Vec::new()
                },
            };

            let calls = match self.backend.complete(&request).await? {
                Completion::Text(text) => return Ok(self.finish(text)),
                Completion::ToolCalls(calls) => calls,
            };

            if !offer_tools {
                return Err(AgentError::ModelBackend(format!(
                    "{} requested tools when none were offered (round {})",
                    self.name,
                    round + 1
                )));
            }

            messages.push(ChatMessage::ToolCalls(calls.clone()));
            let mut outputs = Vec::with_capacity(calls.len());
            for call in &calls {
                let output = self.run_tool(call).await?;
                messages.push(ChatMessage::ToolResult {
                    call_id: call.id.clone(),
                    content: output.clone(),
                });
                outputs.push(output);
            }

            if !self.settings.reflect_on_tool_use {
                return Ok(Message::tool_result(&self.name, outputs.join("\n\n")));
            }
        }

        Err(AgentError::ModelBackend(format!(
            "{} exhausted {max_rounds} tool rounds",
            self.name
        )))
    }
}

fn subject_argument(call: &ToolCallRequest) -> Result<String, AgentError> {
    match &call.arguments {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        args => args
            .get(SUBJECT_PARAMETER)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::ModelBackend(format!(
                    "Tool call {} missing {SUBJECT_PARAMETER} argument",
                    call.name
                ))
            }),
    }
}
