pub mod config;
pub mod decision;
pub mod message;
pub mod outcome;
pub mod transcript;

pub use config::{
    AttachmentFailurePolicy, ConversationConfig, CouncilConfig, GroundingConfig, ModelConfig,
    RelayMode, SessionConfig,
};
pub use decision::{DecisionSignal, Verdict};
pub use message::{Message, MessageKind, TASK_SENDER};
pub use outcome::{ConversationOutcome, StopReason};
pub use transcript::Transcript;
