//! Tolerant JSON parsing for model output
//!
//! Models wrap JSON in prose or markdown fences often enough that a strict
//! parse is useless. Candidates are tried in order: the whole text, the first
//! fenced code block, then the outermost object or array slice.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Parse a structured value out of raw model text
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    let trimmed = response.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        return Err(Error::invalid_response("empty response", response));
    }

    let mut last_error = None;
    for candidate in json_candidates(trimmed) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    let reason = match last_error {
        Some(e) => format!("response is not valid JSON for the expected shape ({})", e),
        None => "no JSON found in response".to_string(),
    };
    Err(Error::invalid_response(reason, response))
}

/// Candidate JSON substrings, most literal first
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Some(block) = fenced_block(text) {
        candidates.push(block);
    }

    if let Some(slice) = outer_slice(text, '{', '}') {
        candidates.push(slice);
    }
    if let Some(slice) = outer_slice(text, '[', ']') {
        candidates.push(slice);
    }

    candidates.dedup();
    candidates
}

/// Contents of the first ``` fenced block, skipping a language tag
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            newline + 1
        }
        _ => 0,
    };
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outer_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ready: bool,
    }

    #[test]
    fn test_direct_parse() {
        let v: Verdict = parse_json_response("{\"ready\": true}").unwrap();
        assert!(v.ready);
    }

    #[test]
    fn test_fenced_json_block() {
        let v: Verdict =
            parse_json_response("Here you go:\n```json\n{\"ready\": false}\n```\nThanks").unwrap();
        assert!(!v.ready);
    }

    #[test]
    fn test_fenced_block_without_language() {
        let v: Verdict = parse_json_response("```\n{\"ready\": true}\n```").unwrap();
        assert!(v.ready);
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let v: Verdict = parse_json_response("The verdict is {\"ready\": true} overall.").unwrap();
        assert!(v.ready);
    }

    #[test]
    fn test_top_level_array() {
        let v: Vec<String> = parse_json_response("Angles: [\"one\", \"two\"]").unwrap();
        assert_eq!(v, vec!["one", "two"]);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let result: Result<Verdict> = parse_json_response("{\"ready\": \"maybe\"}");
        match result {
            Err(Error::InvalidResponse { reason, .. }) => assert!(reason.contains("expected shape")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_and_prose_fail() {
        assert!(parse_json_response::<Verdict>("   ").is_err());
        assert!(parse_json_response::<Verdict>("no json here").is_err());
    }

    #[test]
    fn test_fenced_block_helper() {
        assert_eq!(fenced_block("```rust\nfn x() {}\n```"), Some("fn x() {}"));
        assert_eq!(fenced_block("no fence"), None);
        assert_eq!(fenced_block("```unterminated"), None);
    }
}
