//! Integration tests against the real Azure services.
//!
//! These tests are `#[ignore]` by default. They read the same environment
//! variables as the `council` binary:
//! - `AZURE_ENDPOINT`, `API_KEY`, `MODEL_DEPLOYMENT_NAME`, `MODEL_API_VERSION`
//! - `PROJECT_CONNECTION_STRING`, `PROJECT_ACCESS_TOKEN`, `BING_CONNECTION_NAME`
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p council-agents --test azure_live -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use council_agents::model::{ChatMessage, Completion, CompletionRequest};
use council_agents::prompts::news_analysis_brief;
use council_agents::tool::ResearchTimeouts;
use council_agents::{
    AzureAgentsBackend, AzureAgentsConfig, AzureOpenAiBackend, AzureOpenAiConfig,
    GroundedResearchTool, ModelBackend, ProjectConnection, ToolInvoker,
};

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn model_backend() -> Option<AzureOpenAiBackend> {
    Some(AzureOpenAiBackend::new(AzureOpenAiConfig {
        endpoint: env("AZURE_ENDPOINT")?,
        deployment: env("MODEL_DEPLOYMENT_NAME")?,
        api_version: env("MODEL_API_VERSION")?,
        api_key: env("API_KEY")?,
        timeout: Duration::from_secs(120),
        temperature: None,
    }))
}

fn grounding_backend() -> Option<AzureAgentsBackend> {
    let connection = ProjectConnection::parse(&env("PROJECT_CONNECTION_STRING")?).ok()?;
    let bing_connection_id = connection.connection_id(&env("BING_CONNECTION_NAME")?);
    Some(AzureAgentsBackend::new(AzureAgentsConfig {
        connection,
        access_token: env("PROJECT_ACCESS_TOKEN")?,
        bing_connection_id,
        api_version: "2024-12-01-preview".to_string(),
        request_timeout: Duration::from_secs(60),
        poll_interval: Duration::from_millis(500),
    }))
}

/// A trivial completion comes back as text.
#[tokio::test]
#[ignore]
async fn completion_returns_text() {
    let Some(backend) = model_backend() else {
        eprintln!("Skipping: Azure OpenAI environment not configured");
        return;
    };

    let request = CompletionRequest {
        messages: vec![
            ChatMessage::System("Answer with a single word.".to_string()),
            ChatMessage::User {
                name: "user".to_string(),
                content: "What color is the sky on a clear day?".to_string(),
            },
        ],
        tools: vec![],
    };
    match backend.complete(&request).await.unwrap() {
        Completion::Text(text) => assert!(!text.trim().is_empty()),
        other => panic!("expected text, got {other:?}"),
    }
}

/// One grounded research call runs the full agent lifecycle and returns prose.
#[tokio::test]
#[ignore]
async fn grounded_news_research() {
    let Some(backend) = grounding_backend() else {
        eprintln!("Skipping: Azure AI project environment not configured");
        return;
    };

    let tool = GroundedResearchTool::new(
        news_analysis_brief(),
        "gpt-4o",
        Arc::new(backend),
        ResearchTimeouts::default(),
    );
    let answer = tool.invoke("MSFT").await.unwrap();
    assert!(answer.len() > 20, "answer too short: {answer}");
}
