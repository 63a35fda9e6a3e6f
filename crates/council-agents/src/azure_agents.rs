use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AgentError, ToolError};
use crate::grounding::{
    AgentHandle, AgentSpec, GroundingBackend, RunResult, ThreadHandle, ThreadMessage,
};

/// Run statuses that mean the service is still working.
const PENDING_STATUSES: [&str; 3] = ["queued", "in_progress", "cancelling"];

/// Floor for the run-status poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The four coordinates packed into a project connection string
/// (`host;subscription_id;resource_group;project_name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConnection {
    pub host: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub project_name: String,
}

impl ProjectConnection {
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return Err(AgentError::Configuration(format!(
                "project connection string must be 'host;subscription;resource_group;project', \
                 got {} non-empty segment(s)",
                parts.iter().filter(|p| !p.is_empty()).count()
            )));
        }

        let host = parts[0]
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            subscription_id: parts[1].to_string(),
            resource_group: parts[2].to_string(),
            project_name: parts[3].to_string(),
        })
    }

    fn workspace_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.subscription_id, self.resource_group, self.project_name
        )
    }

    pub fn agents_base_url(&self) -> String {
        format!("https://{}/agents/v1.0/{}", self.host, self.workspace_path())
    }

    /// Resource id of a named project connection (e.g. the Bing search connection).
    pub fn connection_id(&self, connection_name: &str) -> String {
        format!("/{}/connections/{}", self.workspace_path(), connection_name)
    }
}

/// Settings for the Azure AI Agents service.
#[derive(Clone)]
pub struct AzureAgentsConfig {
    pub connection: ProjectConnection,
    pub access_token: String,
    /// Resource id of the Bing grounding connection attached to every research agent.
    pub bing_connection_id: String,
    pub api_version: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl fmt::Debug for AzureAgentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAgentsConfig")
            .field("connection", &self.connection)
            .field("access_token", &"<redacted>")
            .field("bing_connection_id", &self.bing_connection_id)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Grounding backend backed by the Azure AI Agents REST API with Bing grounding.
pub struct AzureAgentsBackend {
    client: reqwest::Client,
    config: AzureAgentsConfig,
    base_url: String,
}

impl AzureAgentsBackend {
    pub fn new(mut config: AzureAgentsConfig) -> Self {
        if config.poll_interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = config.poll_interval.as_millis() as u64,
                "Poll interval too short, clamping"
            );
            config.poll_interval = MIN_POLL_INTERVAL;
        }
        let base_url = config.connection.agents_base_url();
        Self {
            client: reqwest::Client::new(),
            config,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ToolError> {
        let request = request
            .bearer_auth(&self.config.access_token)
            .query(&[("api-version", self.config.api_version.as_str())]);

        let (status, body) = tokio::time::timeout(self.config.request_timeout, async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await
        .map_err(|_| ToolError::Timeout(self.config.request_timeout))??;

        if !status.is_success() {
            warn!(status = %status, "Agents service request failed");
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ToolError::Malformed(e.to_string()))
    }

    async fn fetch_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<WireRun, ToolError> {
        self.send(
            self.client
                .get(self.url(&format!("threads/{}/runs/{}", thread.id, run_id))),
        )
        .await
    }
}

#[async_trait]
impl GroundingBackend for AzureAgentsBackend {
    fn grounding_tools(&self) -> Vec<serde_json::Value> {
        vec![bing_grounding_tool(&self.config.bing_connection_id)]
    }

    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, ToolError> {
        let created: WireId = self
            .send(self.client.post(self.url("assistants")).json(spec))
            .await?;
        debug!(agent_id = %created.id, name = %spec.name, "Created research agent");
        Ok(AgentHandle { id: created.id })
    }

    async fn create_thread(&self) -> Result<ThreadHandle, ToolError> {
        let created: WireId = self
            .send(
                self.client
                    .post(self.url("threads"))
                    .json(&serde_json::json!({})),
            )
            .await?;
        Ok(ThreadHandle { id: created.id })
    }

    async fn post_message(
        &self,
        thread: &ThreadHandle,
        role: &str,
        content: &str,
    ) -> Result<(), ToolError> {
        let _: WireId = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{}/messages", thread.id)))
                    .json(&serde_json::json!({ "role": role, "content": content })),
            )
            .await?;
        Ok(())
    }

    async fn run_and_process(
        &self,
        thread: &ThreadHandle,
        agent: &AgentHandle,
    ) -> Result<RunResult, ToolError> {
        let mut run: WireRun = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{}/runs", thread.id)))
                    .json(&serde_json::json!({ "assistant_id": agent.id })),
            )
            .await?;

        while PENDING_STATUSES.contains(&run.status.as_str()) {
            tokio::time::sleep(self.config.poll_interval).await;
            run = self.fetch_run(thread, &run.id).await?;
            debug!(run_id = %run.id, status = %run.status, "Polled research run");
        }

        Ok(run.into())
    }

    async fn list_messages(&self, thread: &ThreadHandle) -> Result<Vec<ThreadMessage>, ToolError> {
        let list: WireMessageList = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{}/messages", thread.id)))
                    .query(&[("order", "desc")]),
            )
            .await?;
        Ok(list.into_thread_messages())
    }

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), ToolError> {
        let deletion: WireDeletion = self
            .send(
                self.client
                    .delete(self.url(&format!("assistants/{}", agent.id))),
            )
            .await?;
        if !deletion.deleted {
            return Err(ToolError::Malformed(format!(
                "service did not confirm deletion of agent {}",
                agent.id
            )));
        }
        Ok(())
    }
}

/// Tool definition that attaches a Bing search connection to an agent.
pub fn bing_grounding_tool(connection_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "bing_grounding",
        "bing_grounding": {
            "connections": [{ "connection_id": connection_id }]
        }
    })
}

#[derive(Debug, Deserialize)]
struct WireId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    id: String,
    status: String,
    last_error: Option<WireRunError>,
}

#[derive(Debug, Deserialize)]
struct WireRunError {
    code: Option<String>,
    message: Option<String>,
}

impl From<WireRun> for RunResult {
    fn from(run: WireRun) -> Self {
        let last_error = run.last_error.map(|e| {
            match (e.code, e.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (Some(code), None) => code,
                (None, Some(message)) => message,
                (None, None) => "unknown error".to_string(),
            }
        });
        RunResult {
            id: run.id,
            status: run.status,
            last_error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessageList {
    data: Vec<WireThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct WireThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<WireText>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    value: String,
}

impl WireMessageList {
    fn into_thread_messages(self) -> Vec<ThreadMessage> {
        self.data
            .into_iter()
            .map(|m| ThreadMessage {
                role: m.role,
                text: m
                    .content
                    .into_iter()
                    .filter(|c| c.kind == "text")
                    .filter_map(|c| c.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct WireDeletion {
    #[serde(default)]
    deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "eastus.api.azureml.ms;0000-1111;rg-invest;stock-project";

    #[test]
    fn parse_connection_string() {
        let conn = ProjectConnection::parse(CONN).unwrap();
        assert_eq!(conn.host, "eastus.api.azureml.ms");
        assert_eq!(conn.subscription_id, "0000-1111");
        assert_eq!(conn.resource_group, "rg-invest");
        assert_eq!(conn.project_name, "stock-project");
    }

    #[test]
    fn parse_connection_string_strips_scheme() {
        let conn =
            ProjectConnection::parse("https://eastus.api.azureml.ms/;sub;rg;proj").unwrap();
        assert_eq!(conn.host, "eastus.api.azureml.ms");
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        assert!(matches!(
            ProjectConnection::parse("host;sub;rg"),
            Err(AgentError::Configuration(_))
        ));
        assert!(ProjectConnection::parse("host;sub;;proj").is_err());
    }

    #[test]
    fn urls_and_connection_id() {
        let conn = ProjectConnection::parse(CONN).unwrap();
        assert_eq!(
            conn.agents_base_url(),
            "https://eastus.api.azureml.ms/agents/v1.0/subscriptions/0000-1111/resourceGroups/rg-invest/providers/Microsoft.MachineLearningServices/workspaces/stock-project"
        );
        assert_eq!(
            conn.connection_id("bing-search"),
            "/subscriptions/0000-1111/resourceGroups/rg-invest/providers/Microsoft.MachineLearningServices/workspaces/stock-project/connections/bing-search"
        );
    }

    #[test]
    fn bing_tool_definition_shape() {
        let tool = bing_grounding_tool("/conn/id");
        assert_eq!(tool["type"], "bing_grounding");
        assert_eq!(
            tool["bing_grounding"]["connections"][0]["connection_id"],
            "/conn/id"
        );
    }

    #[test]
    fn run_error_is_flattened() {
        let run: WireRun = serde_json::from_str(
            r#"{"id":"run_1","status":"failed","last_error":{"code":"rate_limit_exceeded","message":"slow down"}}"#,
        )
        .unwrap();
        let result: RunResult = run.into();
        assert!(!result.succeeded());
        assert_eq!(
            result.last_error.as_deref(),
            Some("rate_limit_exceeded: slow down")
        );
    }

    #[test]
    fn message_list_keeps_text_parts_only() {
        let list: WireMessageList = serde_json::from_str(
            r#"{"object":"list","data":[
                {"id":"msg_2","role":"assistant","content":[
                    {"type":"text","text":{"value":"NVDA rose 12% over three months.","annotations":[]}},
                    {"type":"image_file","image_file":{"file_id":"f"}}
                ]},
                {"id":"msg_1","role":"user","content":[{"type":"text","text":{"value":"Please get stock price trends data for NVDA."}}]}
            ]}"#,
        )
        .unwrap();
        let messages = list.into_thread_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].text, "NVDA rose 12% over three months.");
        assert_eq!(messages[1].role, "user");
    }

    fn config(poll_interval: Duration) -> AzureAgentsConfig {
        AzureAgentsConfig {
            connection: ProjectConnection::parse(CONN).unwrap(),
            access_token: "bearer-secret".to_string(),
            bing_connection_id: "/conn".to_string(),
            api_version: "2024-12-01-preview".to_string(),
            request_timeout: Duration::from_secs(5),
            poll_interval,
        }
    }

    #[test]
    fn debug_redacts_token() {
        let config = config(Duration::from_millis(100));
        assert!(!format!("{config:?}").contains("bearer-secret"));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let backend = AzureAgentsBackend::new(config(Duration::ZERO));
        assert_eq!(backend.config.poll_interval, MIN_POLL_INTERVAL);

        let backend = AzureAgentsBackend::new(config(Duration::from_millis(750)));
        assert_eq!(backend.config.poll_interval, Duration::from_millis(750));
    }
}
