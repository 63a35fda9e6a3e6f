use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The final call made by the decision participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Invest,
    DoNotInvest,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Invest => "Invest",
            Verdict::DoNotInvest => "Do not invest",
        }
    }
}

/// Structured terminal signal emitted alongside the decision text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionSignal {
    pub verdict: Verdict,
    /// Last traded price quoted by the decision participant, if it gave one.
    pub current_price: Option<Decimal>,
    pub rationale: Option<String>,
}
