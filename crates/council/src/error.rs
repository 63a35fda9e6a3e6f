use council_agents::AgentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment: {}", .0.join("; "))]
    Environment(Vec<String>),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Error reading PDF {name}: {reason}")]
    Pdf { name: String, reason: String },

    #[error("Attachment {name} is not valid UTF-8 text")]
    Encoding { name: String },

    #[error("Failed to read attachment {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to archive attachment {name}: {source}")]
    Archive {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that ends a session early.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Conversation(#[from] AgentError),

    #[error("Relay error: {0}")]
    Relay(String),
}
