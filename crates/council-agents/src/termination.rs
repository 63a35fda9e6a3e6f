use std::ops::BitOr;

use council_models::{StopReason, Transcript};

/// Condition over the transcript that ends a conversation.
///
/// Evaluated after every append, seed included. Predicates combine with `|`;
/// the first one that holds names the stop reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationPredicate {
    MessageCountAtLeast(usize),
    ContentContains(String),
    VerdictReached,
    Any(Vec<TerminationPredicate>),
}

impl TerminationPredicate {
    pub fn evaluate(&self, transcript: &Transcript) -> Option<StopReason> {
        match self {
            Self::MessageCountAtLeast(n) => {
                (transcript.len() >= *n).then_some(StopReason::MessageLimit)
            }
            Self::ContentContains(marker) => transcript
                .iter()
                .any(|m| m.content.contains(marker.as_str()))
                .then_some(StopReason::MarkerFound),
            Self::VerdictReached => transcript
                .iter()
                .any(|m| m.verdict.is_some())
                .then_some(StopReason::VerdictReached),
            Self::Any(predicates) => predicates.iter().find_map(|p| p.evaluate(transcript)),
        }
    }

    /// Largest transcript length this predicate permits, if it bounds one.
    pub fn message_bound(&self) -> Option<usize> {
        match self {
            Self::MessageCountAtLeast(n) => Some(*n),
            Self::Any(predicates) => predicates.iter().filter_map(|p| p.message_bound()).min(),
            _ => None,
        }
    }
}

impl BitOr for TerminationPredicate {
    type Output = TerminationPredicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        let mut predicates = match self {
            Self::Any(list) => list,
            other => vec![other],
        };
        match rhs {
            Self::Any(list) => predicates.extend(list),
            other => predicates.push(other),
        }
        Self::Any(predicates)
    }
}
