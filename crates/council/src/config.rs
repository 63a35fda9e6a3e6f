use std::fmt;
use std::path::Path;

use council_agents::ProjectConnection;
use council_models::CouncilConfig;
use tracing::{info, warn};

use crate::error::ConfigError;

pub const API_KEY: &str = "API_KEY";
pub const PROJECT_CONNECTION_STRING: &str = "PROJECT_CONNECTION_STRING";
pub const BING_CONNECTION_NAME: &str = "BING_CONNECTION_NAME";
pub const MODEL_DEPLOYMENT_NAME: &str = "MODEL_DEPLOYMENT_NAME";
pub const MODEL_API_VERSION: &str = "MODEL_API_VERSION";
pub const AZURE_ENDPOINT: &str = "AZURE_ENDPOINT";
pub const PROJECT_ACCESS_TOKEN: &str = "PROJECT_ACCESS_TOKEN";

/// Endpoints and secrets read from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub project: ProjectConnection,
    pub bing_connection_name: String,
    pub model_deployment: String,
    pub model_api_version: String,
    pub azure_endpoint: String,
    pub project_access_token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read every variable through `lookup`, collecting all problems before
    /// failing so the operator sees them in one go.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let mut required = |key: &str| -> String {
            match lookup(key).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    problems.push(format!("{key} is not set"));
                    String::new()
                }
            }
        };

        let api_key = required(API_KEY);
        let connection_string = required(PROJECT_CONNECTION_STRING);
        let bing_connection_name = required(BING_CONNECTION_NAME);
        let model_deployment = required(MODEL_DEPLOYMENT_NAME);
        let model_api_version = required(MODEL_API_VERSION);
        let azure_endpoint = required(AZURE_ENDPOINT);
        let project_access_token = required(PROJECT_ACCESS_TOKEN);

        if !azure_endpoint.is_empty()
            && !(azure_endpoint.starts_with("https://") || azure_endpoint.starts_with("http://"))
        {
            problems.push(format!("{AZURE_ENDPOINT} must be an http(s) URL"));
        }

        let project = if connection_string.is_empty() {
            None
        } else {
            match ProjectConnection::parse(&connection_string) {
                Ok(project) => Some(project),
                Err(e) => {
                    problems.push(format!("{PROJECT_CONNECTION_STRING}: {e}"));
                    None
                }
            }
        };

        match project {
            Some(project) if problems.is_empty() => Ok(Self {
                api_key,
                project,
                bing_connection_name,
                model_deployment,
                model_api_version,
                azure_endpoint,
                project_access_token,
            }),
            _ => Err(ConfigError::Environment(problems)),
        }
    }

    /// Resource id of the Bing connection inside the project.
    pub fn bing_connection_id(&self) -> String {
        self.project.connection_id(&self.bing_connection_name)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("project", &self.project)
            .field("bing_connection_name", &self.bing_connection_name)
            .field("model_deployment", &self.model_deployment)
            .field("model_api_version", &self.model_api_version)
            .field("azure_endpoint", &self.azure_endpoint)
            .field("project_access_token", &"<redacted>")
            .finish()
    }
}

/// Read the tuning file, or fall back to defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<CouncilConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(CouncilConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&raw)?)
}

/// Load the nearest `.env` file from the working directory or its ancestors.
pub fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(()) => info!(path = %candidate.display(), "Loaded environment from .env"),
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "Failed to load .env file")
                }
            }
            return;
        }
        if !current.pop() {
            break;
        }
    }

    info!(cwd = %cwd.display(), "No .env file found; using process environment only");
}
