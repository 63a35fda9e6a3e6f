use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::model::{ChatMessage, Completion, CompletionRequest, ModelBackend, ToolCallRequest};

/// Connection settings for an Azure OpenAI chat deployment.
#[derive(Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl AzureOpenAiConfig {
    pub fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

impl fmt::Debug for AzureOpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Chat-completion backend talking to Azure OpenAI over HTTPS.
pub struct AzureOpenAiBackend {
    client: reqwest::Client,
    config: AzureOpenAiConfig,
}

impl AzureOpenAiBackend {
    pub fn new(config: AzureOpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ModelBackend for AzureOpenAiBackend {
    fn name(&self) -> &str {
        &self.config.deployment
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AgentError> {
        debug!(
            deployment = %self.config.deployment,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting completion"
        );

        let body = WireRequest::from_request(request, self.config.temperature);
        let (status, text) = tokio::time::timeout(self.config.timeout, async {
            let response = self
                .client
                .post(self.config.chat_url())
                .header("api-key", &self.config.api_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        })
        .await
        .map_err(|_| AgentError::Timeout {
            operation: "Model completion".to_string(),
            after: self.config.timeout,
        })??;

        if !status.is_success() {
            warn!(status = %status, body = %text, "Completion request failed");
            return Err(AgentError::ModelBackend(format!("HTTP {status}: {text}")));
        }

        let wire: WireResponse = serde_json::from_str(&text)?;
        parse_completion(wire)
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl WireRequest {
    fn from_request(request: &CompletionRequest, temperature: Option<f32>) -> Self {
        Self {
            messages: to_wire_messages(&request.messages),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function".to_string(),
                    function: WireFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
            temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn plain(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments object, as the API transmits it.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| match m {
            ChatMessage::System(text) => WireMessage::plain("system", text.clone()),
            ChatMessage::User { name, content } => WireMessage {
                name: Some(name.clone()),
                ..WireMessage::plain("user", content.clone())
            },
            ChatMessage::Assistant(text) => WireMessage::plain("assistant", text.clone()),
            ChatMessage::ToolCalls(calls) => WireMessage {
                role: "assistant",
                content: None,
                name: None,
                tool_calls: Some(
                    calls
                        .iter()
                        .map(|c| WireToolCall {
                            id: c.id.clone(),
                            kind: function_kind(),
                            function: WireFunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.to_string(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            },
            ChatMessage::ToolResult { call_id, content } => WireMessage {
                tool_call_id: Some(call_id.clone()),
                ..WireMessage::plain("tool", content.clone())
            },
        })
        .collect()
}

fn parse_completion(response: WireResponse) -> Result<Completion, AgentError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::ModelBackend("No choices in completion".to_string()))?;

    debug!(finish_reason = ?choice.finish_reason, "Completion received");

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        let calls = tool_calls
            .into_iter()
            .map(|tc| ToolCallRequest {
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments)),
                id: tc.id,
                name: tc.function.name,
            })
            .collect();
        return Ok(Completion::ToolCalls(calls));
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(Completion::Text(text)),
        _ => Err(AgentError::ModelBackend(
            "Completion had neither content nor tool calls".to_string(),
        )),
    }
}
