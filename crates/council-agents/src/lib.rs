pub mod azure_agents;
pub mod azure_openai;
pub mod capability;
pub mod error;
pub mod grounding;
pub mod model;
pub mod parser;
pub mod participant;
pub mod prompts;
pub mod scheduler;
pub mod team;
pub mod termination;
pub mod tool;

pub mod test_support;

pub use azure_agents::{AzureAgentsBackend, AzureAgentsConfig, ProjectConnection};
pub use azure_openai::{AzureOpenAiBackend, AzureOpenAiConfig};
pub use capability::CapabilitySet;
pub use error::{AgentError, ToolError};
pub use grounding::GroundingBackend;
pub use model::ModelBackend;
pub use participant::{ConversationalAgent, Participant, TurnSettings};
pub use scheduler::{Conversation, ConversationScheduler, ConversationState};
pub use team::{build_investment_team, termination_for};
pub use termination::TerminationPredicate;
pub use tool::{GroundedResearchTool, ToolInvoker};
