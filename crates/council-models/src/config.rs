use serde::{Deserialize, Serialize};

/// Top-level tuning configuration for Council.
///
/// Credentials and endpoints are not part of this file; they come from the
/// environment at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CouncilConfig {
    pub model: ModelConfig,
    pub grounding: GroundingConfig,
    pub conversation: ConversationConfig,
    pub session: SessionConfig,
}

/// Settings for the chat-completion backend shared by all participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Timeout in seconds for a single completion request.
    pub request_timeout_seconds: u64,
    /// Maximum number of tool-calling rounds within one participant turn.
    pub max_tool_rounds: u32,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 120,
            max_tool_rounds: 4,
            temperature: None,
        }
    }
}

/// Settings for the grounded-search agent service used by research tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroundingConfig {
    /// Model deployment the ephemeral research agents run on.
    pub agent_model: String,
    /// API version of the agents service.
    pub api_version: String,
    /// Timeout in seconds for each HTTP request to the agents service.
    pub request_timeout_seconds: u64,
    /// Deadline in seconds for the research phase of one tool call.
    pub tool_timeout_seconds: u64,
    /// Deadline in seconds for deleting the ephemeral agent after a call.
    pub cleanup_timeout_seconds: u64,
    /// Delay between run status polls, in milliseconds.
    pub poll_interval_millis: u64,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            agent_model: "gpt-4o".to_string(),
            api_version: "2024-12-01-preview".to_string(),
            request_timeout_seconds: 60,
            tool_timeout_seconds: 180,
            cleanup_timeout_seconds: 15,
            poll_interval_millis: 500,
        }
    }
}

/// Round-robin conversation bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
    /// Stop once the transcript holds this many messages, seed task included.
    pub max_messages: usize,
    /// Stop once any message contains this literal text.
    pub termination_marker: String,
    /// Also stop when the decision participant emits a structured verdict.
    pub stop_on_verdict: bool,
    /// When false, a turn that used tools returns the raw tool output instead
    /// of asking the model to summarize it.
    pub reflect_on_tool_use: bool,
    /// Deadline in seconds for a single participant turn.
    pub turn_timeout_seconds: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_messages: 15,
            termination_marker: "Decision Made".to_string(),
            stop_on_verdict: true,
            reflect_on_tool_use: true,
            turn_timeout_seconds: 300,
        }
    }
}

/// What to do when an attachment cannot be converted to text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentFailurePolicy {
    /// Fail the session with the generic notice.
    #[default]
    Abort,
    /// Embed the extraction error text in the task and carry on.
    Inline,
}

/// When participant messages are delivered to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Deliver the text messages only after the conversation completed.
    #[default]
    OnCompletion,
    /// Deliver each text message as soon as it is appended.
    Live,
}

/// Per-session behavior of the entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub attachment_failure: AttachmentFailurePolicy,
    pub relay_mode: RelayMode,
    /// Directory that receives a copy of every recognized attachment.
    pub archive_dir: Option<String>,
    /// The single message shown to the user when a session fails.
    pub failure_notice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attachment_failure: AttachmentFailurePolicy::Abort,
            relay_mode: RelayMode::OnCompletion,
            archive_dir: None,
            failure_notice: "An error occurred while processing your request.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_council_config() {
        let config = CouncilConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: CouncilConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn reference_conversation_bounds() {
        let conversation = ConversationConfig::default();
        assert_eq!(conversation.max_messages, 15);
        assert_eq!(conversation.termination_marker, "Decision Made");
        assert!(conversation.stop_on_verdict);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: CouncilConfig = toml::from_str("").unwrap();
        assert_eq!(config, CouncilConfig::default());
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[model]
request_timeout_seconds = 30
max_tool_rounds = 2

[grounding]
agent_model = "gpt-4o-mini"
poll_interval_millis = 250

[conversation]
max_messages = 9
termination_marker = "FINAL"
reflect_on_tool_use = false

[session]
attachment_failure = "inline"
relay_mode = "live"
archive_dir = "saved_files"
"#;

        let config: CouncilConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.max_tool_rounds, 2);
        assert_eq!(config.grounding.agent_model, "gpt-4o-mini");
        assert_eq!(config.grounding.tool_timeout_seconds, 180);
        assert_eq!(config.conversation.max_messages, 9);
        assert!(!config.conversation.reflect_on_tool_use);
        assert!(config.conversation.stop_on_verdict);
        assert_eq!(
            config.session.attachment_failure,
            AttachmentFailurePolicy::Inline
        );
        assert_eq!(config.session.relay_mode, RelayMode::Live);
        assert_eq!(config.session.archive_dir.as_deref(), Some("saved_files"));
        assert_eq!(
            config.session.failure_notice,
            SessionConfig::default().failure_notice
        );
    }

    #[test]
    fn shipped_example_matches_defaults() {
        let config: CouncilConfig =
            toml::from_str(include_str!("../../../config/council.toml")).unwrap();
        assert_eq!(config, CouncilConfig::default());
    }
}
