use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use council_agents::ConversationScheduler;
use council_models::{ConversationOutcome, RelayMode, SessionConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::attachment::{archive, compose_task, Attachment};
use crate::error::SessionError;

/// The user-facing surface messages are delivered to.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), SessionError>;
}

/// One inbound user message.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub input: String,
    pub attachments: Vec<Attachment>,
}

impl SessionRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed(ConversationOutcome),
    /// The failure notice was relayed in place of any transcript.
    Failed(SessionError),
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }
}

/// Turns one user message into one conversation and relays what it says.
pub struct SessionEntrypoint {
    scheduler: Arc<ConversationScheduler>,
    config: SessionConfig,
}

impl SessionEntrypoint {
    pub fn new(scheduler: Arc<ConversationScheduler>, config: SessionConfig) -> Self {
        Self { scheduler, config }
    }

    /// Handle a message end to end. Errors never escape: they are logged and
    /// the user gets the configured failure notice instead.
    pub async fn handle(
        &self,
        request: SessionRequest,
        relay: &dyn Relay,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        let start = Instant::now();
        info!(
            input_len = request.input.len(),
            attachments = request.attachments.len(),
            "Session started"
        );

        match self.process(&request, relay, cancel).await {
            Ok(outcome) => {
                info!(
                    session_id = %outcome.session_id,
                    stop_reason = ?outcome.stop_reason,
                    messages = outcome.transcript.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Session complete"
                );
                SessionOutcome::Completed(outcome)
            }
            Err(e) => {
                error!(error = %e, elapsed_ms = start.elapsed().as_millis() as u64, "Session failed");
                if let Err(relay_error) = relay.deliver(&self.config.failure_notice).await {
                    error!(error = %relay_error, "Failed to relay failure notice");
                }
                SessionOutcome::Failed(e)
            }
        }
    }

    async fn process(
        &self,
        request: &SessionRequest,
        relay: &dyn Relay,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome, SessionError> {
        if let Some(dir) = &self.config.archive_dir {
            for attachment in request.attachments.iter().filter(|a| a.is_recognized()) {
                let path = archive(attachment, Path::new(dir)).await?;
                relay
                    .deliver(&format!("File saved at: {}", path.display()))
                    .await?;
            }
        }

        let task = compose_task(
            &request.input,
            &request.attachments,
            self.config.attachment_failure,
        )
        .await?;

        match self.config.relay_mode {
            RelayMode::OnCompletion => {
                let outcome = self.scheduler.run(&task, cancel).await?;
                for message in outcome.transcript.iter() {
                    if message.is_text() {
                        relay.deliver(&message.content).await?;
                    } else {
                        debug!(sender = %message.sender, kind = ?message.kind, "Skipping non-text message");
                    }
                }
                Ok(outcome)
            }
            RelayMode::Live => {
                // Cancelled by the forwarder once the surface fails.
                let run_cancel = cancel.child_token();
                let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
                let run = self.scheduler.run_streaming(&task, &run_cancel, tx);
                let forward = async {
                    while let Some(message) = rx.recv().await {
                        if !message.is_text() {
                            debug!(sender = %message.sender, kind = ?message.kind, "Skipping non-text message");
                            continue;
                        }
                        if let Err(e) = relay.deliver(&message.content).await {
                            run_cancel.cancel();
                            return Err(e);
                        }
                    }
                    Ok::<(), SessionError>(())
                };

                let (outcome, forwarded) = tokio::join!(run, forward);
                forwarded?;
                Ok(outcome?)
            }
        }
    }
}
