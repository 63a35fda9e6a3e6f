use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::DecisionSignal;
use crate::transcript::Transcript;

/// Which termination predicate ended a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MessageLimit,
    MarkerFound,
    VerdictReached,
}

/// Result of one completed conversation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationOutcome {
    pub session_id: Uuid,
    pub transcript: Transcript,
    pub stop_reason: StopReason,
    /// Number of participant turns taken (the seed task is not a turn).
    pub turns: usize,
    pub elapsed_ms: u64,
}

impl ConversationOutcome {
    /// The most recent structured verdict in the transcript, if any.
    pub fn verdict(&self) -> Option<&DecisionSignal> {
        self.transcript
            .messages()
            .iter()
            .rev()
            .find_map(|m| m.verdict.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Verdict;
    use crate::message::Message;

    #[test]
    fn verdict_picks_latest_signal() {
        let mut transcript = Transcript::seeded(Message::task("MSFT"));
        transcript.append(Message::text("decision_agent", "first").with_verdict(
            DecisionSignal {
                verdict: Verdict::DoNotInvest,
                current_price: None,
                rationale: None,
            },
        ));
        transcript.append(Message::text("decision_agent", "second").with_verdict(
            DecisionSignal {
                verdict: Verdict::Invest,
                current_price: None,
                rationale: None,
            },
        ));

        let outcome = ConversationOutcome {
            session_id: Uuid::new_v4(),
            transcript,
            stop_reason: StopReason::VerdictReached,
            turns: 2,
            elapsed_ms: 10,
        };
        assert_eq!(outcome.verdict().unwrap().verdict, Verdict::Invest);
    }

    #[test]
    fn stop_reason_wire_names() {
        let json = serde_json::to_string(&StopReason::MarkerFound).unwrap();
        assert_eq!(json, "\"marker_found\"");
    }
}
