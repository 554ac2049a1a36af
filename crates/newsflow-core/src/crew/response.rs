//! Structured-output validation for model responses.
//!
//! Stages: strip markdown fences, strict JSON parse, then extraction of the
//! outermost `{...}` or `[...]` span. The reformatting retry that follows a
//! failure here is driven by [`super::LlmCrews`].

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::CrewError;

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^\s*```(?:json)?\s*\n?(.*?)\n?\s*```\s*$").expect("fence pattern is valid")
    })
}

fn json_span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)(\{.*\})|(\[.*\])").expect("json span pattern is valid"))
}

/// Remove a surrounding ```` ```json ```` fence, if any, and trim.
pub fn clean_fences(text: &str) -> String {
    match fence_pattern().captures(text) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => text.trim().to_string(),
    }
}

/// Outermost JSON object or array embedded in surrounding prose.
pub fn extract_json_span(text: &str) -> Option<&str> {
    json_span_pattern().find(text).map(|m| m.as_str())
}

/// Parse a model response into `T`, tolerating fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, CrewError> {
    let cleaned = clean_fences(raw);
    if cleaned.is_empty() {
        return Err(CrewError::Malformed("empty output".to_string()));
    }

    let strict_err = match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    tracing::debug!("[Response] Strict parse failed ({}), trying span extraction", strict_err);

    let Some(span) = extract_json_span(&cleaned) else {
        return Err(CrewError::Malformed(format!(
            "no JSON object or array found ({})",
            strict_err
        )));
    };
    serde_json::from_str::<T>(span).map_err(|e| CrewError::Malformed(e.to_string()))
}
