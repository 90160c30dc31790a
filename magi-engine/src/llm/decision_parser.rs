use magi_core::{Action, Decision};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::error_classifier::truncate_chars;

/// Free text keeps at most this many characters as the reason
pub const REASON_MAX_CHARS: usize = 500;

/// Model output handed to the parser
#[derive(Debug, Clone, Copy)]
pub enum RawOutput<'a> {
    Text(&'a str),
    Structured(&'a Value),
}

/// Turns free-form or semi-structured model output into a [`Decision`].
///
/// Never fails: anything unrecognisable becomes HOLD with confidence 50.
#[derive(Debug, Clone)]
pub struct DecisionParser {
    buy_synonyms: Vec<String>,
    sell_synonyms: Vec<String>,
}

impl Default for DecisionParser {
    fn default() -> Self {
        Self {
            buy_synonyms: vec!["買い".to_string()],
            sell_synonyms: vec!["売り".to_string()],
        }
    }
}

impl DecisionParser {
    pub fn new(buy_synonyms: Vec<String>, sell_synonyms: Vec<String>) -> Self {
        Self {
            buy_synonyms,
            sell_synonyms,
        }
    }

    pub fn parse(&self, raw: RawOutput<'_>) -> Decision {
        match raw {
            RawOutput::Structured(Value::String(text)) => self.parse_text(text),
            RawOutput::Structured(value) => Self::normalize(value),
            RawOutput::Text(text) => self.parse_text(text),
        }
    }

    /// Try the first embedded JSON object, else fall back to keyword extraction.
    /// An object whose `action` is not a string is treated like no object.
    pub fn parse_text(&self, text: &str) -> Decision {
        match first_json_object(text) {
            Some(object) if !has_non_string_action(&object) => Self::normalize(&object),
            _ => self.extract_from_text(text),
        }
    }

    /// Normalise a decoded object.
    ///
    /// Action comes from `action` or `recommendation`, confidence from
    /// `confidence` and reason from `reason`, `rationale` or `explanation`.
    pub fn normalize(value: &Value) -> Decision {
        let action = first_string(value, &["action", "recommendation"])
            .map(str::to_uppercase)
            .and_then(|keyword| Action::from_keyword(&keyword))
            .unwrap_or(Action::Hold);

        let confidence = value
            .get("confidence")
            .and_then(confidence_from_value)
            .unwrap_or(Decision::DEFAULT_CONFIDENCE as i64);

        let reason = first_string(value, &["reason", "rationale", "explanation"])
            .unwrap_or_default()
            .to_string();

        Decision::new(action, confidence, reason)
    }

    /// Keyword scan over free text. BUY is checked before SELL.
    pub fn extract_from_text(&self, text: &str) -> Decision {
        let upper = text.to_uppercase();
        let mentions = |keyword: &str, synonyms: &[String]| {
            upper.contains(keyword) || synonyms.iter().any(|s| upper.contains(&s.to_uppercase()))
        };

        let action = if mentions("BUY", &self.buy_synonyms) {
            Action::Buy
        } else if mentions("SELL", &self.sell_synonyms) {
            Action::Sell
        } else {
            Action::Hold
        };

        let confidence = confidence_from_pattern(text).unwrap_or(Decision::DEFAULT_CONFIDENCE as i64);

        Decision::new(action, confidence, truncate_chars(text, REASON_MAX_CHARS))
    }
}

fn confidence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9]{1,3})%|confidence[:\s]+([0-9]{1,3})")
            .expect("confidence pattern is valid")
    })
}

fn confidence_from_pattern(text: &str) -> Option<i64> {
    let captures = confidence_pattern().captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn confidence_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_f64().and_then(round_finite),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(round_finite)
            .or_else(|| confidence_from_pattern(text)),
        _ => None,
    }
}

fn round_finite(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.round() as i64)
}

fn has_non_string_action(value: &Value) -> bool {
    value
        .get("action")
        .is_some_and(|action| !action.is_null() && !action.is_string())
}

fn first_string<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// The substring from the first `{` to the first `}` after it, if it decodes
/// to a JSON object. Nested objects therefore never decode.
fn first_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = start + text[start..].find('}')?;
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(object @ Value::Object(_)) => Some(object),
        _ => None,
    }
}
