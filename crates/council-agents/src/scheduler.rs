use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use council_models::{ConversationOutcome, Message, StopReason, Transcript};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::participant::ConversationalAgent;
use crate::termination::TerminationPredicate;

/// Drives participants round-robin over a shared transcript.
///
/// Holds no per-run state; every run gets its own [`Conversation`], so one
/// scheduler can serve concurrent sessions.
pub struct ConversationScheduler {
    participants: Vec<Arc<dyn ConversationalAgent>>,
    termination: TerminationPredicate,
    turn_timeout: Duration,
}

impl ConversationScheduler {
    pub fn new(
        participants: Vec<Arc<dyn ConversationalAgent>>,
        termination: TerminationPredicate,
        turn_timeout: Duration,
    ) -> Result<Self, AgentError> {
        if participants.is_empty() {
            return Err(AgentError::Configuration(
                "Conversation needs at least one participant".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for p in &participants {
            if !seen.insert(p.name().to_string()) {
                return Err(AgentError::Configuration(format!(
                    "Duplicate participant name: {}",
                    p.name()
                )));
            }
        }

        Ok(Self {
            participants,
            termination,
            turn_timeout,
        })
    }

    pub fn participant_names(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.name()).collect()
    }

    pub fn termination(&self) -> &TerminationPredicate {
        &self.termination
    }

    pub fn conversation(&self) -> Conversation<'_> {
        Conversation {
            scheduler: self,
            session_id: Uuid::new_v4(),
            state: ConversationState::Idle,
            transcript: Transcript::new(),
            next: 0,
            turns: 0,
            stop_reason: None,
            started: Instant::now(),
        }
    }

    /// Run one conversation for `task` until a termination predicate holds.
    pub async fn run(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome, AgentError> {
        self.drive(task, cancel, None).await
    }

    /// Like [`run`](Self::run), also sending every appended message (the seed
    /// included) to `sink` as soon as it exists.
    pub async fn run_streaming(
        &self,
        task: &str,
        cancel: &CancellationToken,
        sink: UnboundedSender<Message>,
    ) -> Result<ConversationOutcome, AgentError> {
        self.drive(task, cancel, Some(&sink)).await
    }

    async fn drive(
        &self,
        task: &str,
        cancel: &CancellationToken,
        sink: Option<&UnboundedSender<Message>>,
    ) -> Result<ConversationOutcome, AgentError> {
        let mut conversation = self.conversation();
        info!(session_id = %conversation.session_id(), "Conversation started");

        let mut stop = conversation.start(task)?;
        emit(sink, &conversation).await;

        while stop.is_none() {
            stop = conversation.step(cancel).await?;
            emit(sink, &conversation).await;
        }

        conversation.into_outcome()
    }
}

/// Hand the newest message to the sink, then yield so the receiver can act on
/// it (and cancel the run) before the next turn starts.
async fn emit(sink: Option<&UnboundedSender<Message>>, conversation: &Conversation<'_>) {
    if let (Some(tx), Some(message)) = (sink, conversation.transcript().last()) {
        if tx.send(message.clone()).is_err() {
            debug!("Message receiver dropped");
        }
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Running,
    Terminated,
}

/// A single run: Idle, then Running after `start`, then Terminated for good.
pub struct Conversation<'a> {
    scheduler: &'a ConversationScheduler,
    session_id: Uuid,
    state: ConversationState,
    transcript: Transcript,
    next: usize,
    turns: usize,
    stop_reason: Option<StopReason>,
    started: Instant,
}

impl<'a> Conversation<'a> {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Name of the participant whose turn is next.
    pub fn next_speaker(&self) -> &str {
        self.scheduler.participants[self.next].name()
    }

    /// Seed the transcript with the task. Returns the stop reason if the seed
    /// alone already satisfies the termination predicate.
    pub fn start(&mut self, task: &str) -> Result<Option<StopReason>, AgentError> {
        if self.state != ConversationState::Idle {
            return Err(AgentError::InvalidState(format!(
                "cannot start a conversation that is {:?}",
                self.state
            )));
        }
        self.started = Instant::now();
        self.state = ConversationState::Running;
        self.transcript = Transcript::seeded(Message::task(task));
        Ok(self.check_termination())
    }

    /// Give the floor to the next participant and append its message.
    ///
    /// Any error, deadline expiry, or cancellation terminates the conversation.
    pub async fn step(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<StopReason>, AgentError> {
        if self.state != ConversationState::Running {
            return Err(AgentError::InvalidState(format!(
                "cannot step a conversation that is {:?}",
                self.state
            )));
        }

        let scheduler = self.scheduler;
        let agent = &scheduler.participants[self.next];
        let turn_start = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(scheduler.turn_timeout, agent.take_turn(&self.transcript)) => {
                outcome.unwrap_or_else(|_| {
                    Err(AgentError::Timeout {
                        operation: format!("{} turn", agent.name()),
                        after: scheduler.turn_timeout,
                    })
                })
            }
        };

        let message = match result {
            Ok(message) => message,
            Err(e) => {
                self.state = ConversationState::Terminated;
                warn!(
                    session_id = %self.session_id,
                    participant = %agent.name(),
                    error = %e,
                    "Turn failed"
                );
                return Err(e);
            }
        };

        info!(
            session_id = %self.session_id,
            participant = %agent.name(),
            turn = self.turns + 1,
            elapsed_ms = turn_start.elapsed().as_millis() as u64,
            "Turn complete"
        );

        self.transcript.append(message);
        self.turns += 1;
        self.next = (self.next + 1) % scheduler.participants.len();
        Ok(self.check_termination())
    }

    fn check_termination(&mut self) -> Option<StopReason> {
        let reason = self.scheduler.termination.evaluate(&self.transcript)?;
        self.state = ConversationState::Terminated;
        self.stop_reason = Some(reason);
        info!(
            session_id = %self.session_id,
            stop_reason = ?reason,
            messages = self.transcript.len(),
            "Conversation terminated"
        );
        Some(reason)
    }

    /// Consume a conversation that ended through its termination predicate.
    pub fn into_outcome(self) -> Result<ConversationOutcome, AgentError> {
        let stop_reason = self.stop_reason.ok_or_else(|| {
            AgentError::InvalidState(format!(
                "conversation has no outcome while {:?}",
                self.state
            ))
        })?;
        Ok(ConversationOutcome {
            session_id: self.session_id,
            transcript: self.transcript,
            stop_reason,
            turns: self.turns,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        })
    }
}
