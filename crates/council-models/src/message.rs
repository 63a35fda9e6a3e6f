use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::DecisionSignal;

/// Sender name used for the seed task message.
pub const TASK_SENDER: &str = "user";

/// Classification of a transcript entry. Only `Text` reaches the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    ToolResult,
    System,
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    /// Name of the participant that produced the message, or `"user"` for the task.
    pub sender: String,
    pub content: String,
    pub kind: MessageKind,
    /// Structured verdict, only ever set on the decision participant's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<DecisionSignal>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(sender: impl Into<String>, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            content: content.into(),
            kind,
            verdict: None,
            created_at: Utc::now(),
        }
    }

    /// The seed message that opens every conversation.
    pub fn task(content: impl Into<String>) -> Self {
        Self::new(TASK_SENDER, content, MessageKind::System)
    }

    pub fn text(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageKind::Text)
    }

    pub fn tool_result(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageKind::ToolResult)
    }

    pub fn with_verdict(mut self, verdict: DecisionSignal) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == MessageKind::Text
    }
}
