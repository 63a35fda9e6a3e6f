use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use council_models::{DecisionSignal, Verdict};

/// Verdict block as the model writes it, before normalization.
#[derive(Debug, Deserialize)]
struct RawSignal {
    verdict: String,
    #[serde(default)]
    current_price: Option<serde_json::Value>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Find the decision block in a participant's reply.
///
/// The reply is free text that usually ends with a fenced JSON object. When
/// several objects appear, the last one that reads as a verdict wins.
pub fn extract_decision(text: &str) -> Option<DecisionSignal> {
    balanced_objects(text)
        .into_iter()
        .rev()
        .find_map(|candidate| {
            let raw: RawSignal = serde_json::from_str(candidate).ok()?;
            normalize(raw)
        })
}

fn normalize(raw: RawSignal) -> Option<DecisionSignal> {
    let verdict = parse_verdict(&raw.verdict)?;
    let current_price = raw.current_price.as_ref().and_then(parse_price);
    let rationale = raw
        .rationale
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Some(DecisionSignal {
        verdict,
        current_price,
        rationale,
    })
}

fn parse_verdict(value: &str) -> Option<Verdict> {
    let key: String = value
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    match key.as_str() {
        "invest" => Some(Verdict::Invest),
        "do_not_invest" | "dont_invest" | "don't_invest" | "not_invest" => {
            Some(Verdict::DoNotInvest)
        }
        _ => None,
    }
}

/// Accepts `182.5`, `"182.50"` and `"$1,182.50"`.
fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            Decimal::from_str(cleaned.trim()).ok()
        }
        _ => None,
    }
}

/// Every top-level balanced `{ ... }` span, in order of appearance.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' if depth > 0 => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    spans
}
