use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{truncate_chars, AdvisorySignal, Signal, MAX_REASON_CHARS};

/// Greedy match from the first `{` to the last `}`
static OBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{.*\}").expect("Invalid object pattern regex")
});

/// First standalone action word in lowercased text
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(buy|sell|hold)\b").expect("Invalid action token regex")
});

const HEURISTIC_REASON_WORDS: usize = 6;
const NO_REASON: &str = "no reason";
const NO_RESPONSE: &str = "no response";
const PARSE_ERROR: &str = "parse err";

/// Which stage of the pipeline produced the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Normalized,
    Heuristic,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub signal: AdvisorySignal,
    pub stage: ParseStage,
}

/// Result of one stage: either a final answer or a hand-off to the next stage
enum StageResult {
    Resolved(AdvisorySignal),
    Continue,
}

/// Turn raw advisor text into a signal
///
/// Stages run in order `Strict -> Normalized -> Heuristic -> Neutral`; the first
/// one that resolves wins. The last stage always resolves, so any input yields a
/// valid signal.
pub fn parse_response(raw: &str) -> ParseOutcome {
    let stages: [(ParseStage, fn(&str) -> StageResult); 4] = [
        (ParseStage::Strict, strict_parse),
        (ParseStage::Normalized, normalized_parse),
        (ParseStage::Heuristic, heuristic_scan),
        (ParseStage::Neutral, neutral_fallback),
    ];

    for (stage, run) in stages {
        if let StageResult::Resolved(signal) = run(raw) {
            return ParseOutcome { signal, stage };
        }
    }

    // unreachable in practice: the neutral stage always resolves
    ParseOutcome {
        signal: AdvisorySignal::hold(NO_RESPONSE),
        stage: ParseStage::Neutral,
    }
}

fn extract_object(text: &str) -> Option<&str> {
    OBJECT_PATTERN.find(text).map(|m| m.as_str())
}

fn strict_parse(raw: &str) -> StageResult {
    match extract_object(raw).and_then(|obj| serde_json::from_str::<Value>(obj).ok()) {
        Some(value) => resolve_object(&value, raw),
        None => StageResult::Continue,
    }
}

fn normalized_parse(raw: &str) -> StageResult {
    let Some(obj) = extract_object(raw) else {
        return StageResult::Continue;
    };

    match serde_json::from_str::<Value>(&obj.replace('\'', "\"")) {
        Ok(value) => resolve_object(&value, raw),
        Err(_) => StageResult::Continue,
    }
}

/// A decoded object always resolves; an unusable `signal` becomes a neutral hold
fn resolve_object(value: &Value, raw: &str) -> StageResult {
    let Some(object) = value.as_object() else {
        return StageResult::Continue;
    };

    let signal = object
        .get("signal")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .and_then(|s| Signal::from_word(&s));

    let resolved = match signal {
        Some(action) => {
            let reason = object
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(NO_REASON);
            AdvisorySignal::new(action, reason, raw)
        }
        None => AdvisorySignal::new(Signal::Hold, PARSE_ERROR, raw),
    };

    StageResult::Resolved(resolved)
}

fn heuristic_scan(raw: &str) -> StageResult {
    // ASCII lowercasing keeps byte offsets aligned with `raw`
    let lowered = raw.to_ascii_lowercase();
    let Some(caps) = TOKEN_PATTERN.captures(&lowered) else {
        return StageResult::Continue;
    };
    let (Some(word), Some(whole)) = (caps.get(1), caps.get(0)) else {
        return StageResult::Continue;
    };
    let Some(action) = Signal::from_word(word.as_str()) else {
        return StageResult::Continue;
    };

    let reason = match raw.split_once(':') {
        Some((_, after)) => after.trim().to_string(),
        None => words_after(&raw[whole.end()..], HEURISTIC_REASON_WORDS),
    };
    let reason = if reason.is_empty() {
        NO_REASON.to_string()
    } else {
        reason
    };

    StageResult::Resolved(AdvisorySignal::new(action, reason, raw))
}

fn words_after(rest: &str, count: usize) -> String {
    rest.trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

fn neutral_fallback(raw: &str) -> StageResult {
    let trimmed = raw.trim();
    let reason = if trimmed.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        truncate_chars(trimmed, MAX_REASON_CHARS)
    };

    StageResult::Resolved(AdvisorySignal::new(Signal::Hold, reason, raw))
}
