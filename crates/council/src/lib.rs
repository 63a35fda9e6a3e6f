//! Council - multi-agent investment advice
//!
//! Four language-model participants (stock trends, news, sentiment, decision)
//! take turns on a shared transcript, calling web-grounded research tools,
//! until the decision participant makes its call or the message limit is hit.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use council::config::{load_config, Credentials};
//! use council::session::{SessionEntrypoint, SessionRequest};
//! use council::agents::{ConversationScheduler, TerminationPredicate};
//! use council::models::{ConversationOutcome, CouncilConfig};
//! ```

pub use council_agents as agents;
pub use council_models as models;

pub mod attachment;
pub mod config;
pub mod error;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use council_agents::{
    build_investment_team, AzureAgentsBackend, AzureAgentsConfig, AzureOpenAiBackend,
    AzureOpenAiConfig, ConversationScheduler, GroundingBackend, ModelBackend,
};
use council_models::CouncilConfig;

use crate::config::Credentials;
use crate::session::SessionEntrypoint;

/// Build the investment roster against the Azure services named in `credentials`.
pub fn build_scheduler(
    config: &CouncilConfig,
    credentials: &Credentials,
) -> Result<ConversationScheduler, anyhow::Error> {
    let model: Arc<dyn ModelBackend> = Arc::new(AzureOpenAiBackend::new(AzureOpenAiConfig {
        endpoint: credentials.azure_endpoint.clone(),
        deployment: credentials.model_deployment.clone(),
        api_version: credentials.model_api_version.clone(),
        api_key: credentials.api_key.clone(),
        timeout: Duration::from_secs(config.model.request_timeout_seconds),
        temperature: config.model.temperature,
    }));

    let grounding: Arc<dyn GroundingBackend> =
        Arc::new(AzureAgentsBackend::new(AzureAgentsConfig {
            connection: credentials.project.clone(),
            access_token: credentials.project_access_token.clone(),
            bing_connection_id: credentials.bing_connection_id(),
            api_version: config.grounding.api_version.clone(),
            request_timeout: Duration::from_secs(config.grounding.request_timeout_seconds),
            poll_interval: Duration::from_millis(config.grounding.poll_interval_millis),
        }));

    build_investment_team(model, grounding, config).context("Failed to assemble participants")
}

/// Build a session entrypoint around a freshly assembled scheduler.
pub fn build_entrypoint(
    config: &CouncilConfig,
    credentials: &Credentials,
) -> Result<SessionEntrypoint, anyhow::Error> {
    let scheduler = build_scheduler(config, credentials)?;
    Ok(SessionEntrypoint::new(
        Arc::new(scheduler),
        config.session.clone(),
    ))
}
