//! Robust extraction of JSON payloads from LLM response text.
//!
//! Providers are asked for JSON but answer with text. This module builds
//! a short list of candidate readings of the response -- the raw text,
//! the first fenced code block, and comma-sanitized variants of both --
//! and accepts the first candidate that deserializes. Recovery is about
//! syntax only; unknown enum strings are still rejected by the typed
//! deserialization at the call site.

use std::borrow::Cow;

use serde::de::DeserializeOwned;

use crate::error::VerifierError;

/// Parse an LLM response into a typed value.
///
/// Candidates are tried in decreasing order of trust: the trimmed raw
/// text, the contents of the first fenced code block, then each of those
/// with trailing commas removed.
///
/// # Errors
///
/// Returns [`VerifierError::Parse`] if no candidate deserializes.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, VerifierError> {
    for candidate in candidates(raw) {
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Ok(value);
        }
    }
    Err(VerifierError::Parse(format!(
        "no candidate reading parsed as JSON: {}",
        truncate_for_log(raw.trim())
    )))
}

/// The candidate readings of a response, deduplication not needed since
/// a second identical parse attempt is cheap and only happens on failure.
fn candidates(raw: &str) -> Vec<Cow<'_, str>> {
    let trimmed = raw.trim();
    let mut list: Vec<Cow<'_, str>> = vec![Cow::Borrowed(trimmed)];
    if let Some(block) = fenced_block(trimmed) {
        list.push(Cow::Borrowed(block));
    }
    let sanitized: Vec<Cow<'_, str>> = list
        .iter()
        .map(|candidate| Cow::Owned(drop_trailing_commas(candidate)))
        .collect();
    list.extend(sanitized);
    list
}

/// The contents of the first markdown code fence, with any language tag
/// on the fence line removed.
fn fenced_block(text: &str) -> Option<&str> {
    let (_, after_open) = text.split_once("```")?;
    let (block, _) = after_open.split_once("```")?;
    let block = match block.split_once('\n') {
        Some((tag, body))
            if tag.trim().is_empty() || tag.trim().eq_ignore_ascii_case("json") =>
        {
            body
        }
        _ => block,
    };
    Some(block.trim())
}

/// Remove commas that directly precede a closing brace or bracket, the
/// most common syntax slip in model-produced JSON.
///
/// The scan tracks string boundaries so commas (and the whitespace after
/// them) inside string values are never touched. A candidate comma and
/// its trailing whitespace are held back until the next significant
/// character decides whether the comma survives.
fn drop_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut held = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            ',' => {
                out.push_str(&held);
                held.clear();
                held.push(',');
            }
            c if c.is_whitespace() && !held.is_empty() => held.push(c),
            '}' | ']' => {
                // The held comma turned out to be trailing; keep only
                // the whitespace that followed it.
                out.extend(held.chars().filter(|&h| h != ','));
                held.clear();
                out.push(c);
            }
            c => {
                out.push_str(&held);
                held.clear();
                out.push(c);
                if c == '"' {
                    in_string = true;
                }
            }
        }
    }
    out.push_str(&held);
    out
}

/// Cap raw response text quoted in error messages.
fn truncate_for_log(text: &str) -> String {
    const MAX: usize = 400;
    if text.chars().count() <= MAX {
        text.to_owned()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Sample {
        verdict: String,
        confidence: f64,
    }

    #[test]
    fn direct_parse() {
        let raw = r#"{"verdict": "verified", "confidence": 0.9}"#;
        let parsed: Sample = extract_json(raw).unwrap_or(Sample {
            verdict: String::new(),
            confidence: 0.0,
        });
        assert_eq!(parsed.verdict, "verified");
    }

    #[test]
    fn parse_from_json_codeblock() {
        let raw = "Here is my analysis:\n\n```json\n{\"verdict\": \"debunked\", \"confidence\": 0.8}\n```\n\nAs shown above.";
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_ok());
        assert_eq!(parsed.map(|p| p.verdict).unwrap_or_default(), "debunked");
    }

    #[test]
    fn parse_from_plain_codeblock() {
        let raw = "```\n{\"verdict\": \"misleading\", \"confidence\": 0.7}\n```";
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_ok());
    }

    #[test]
    fn parse_trailing_comma() {
        let raw = r#"{"verdict": "verified", "confidence": 0.9,}"#;
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_ok());
    }

    #[test]
    fn parse_codeblock_with_trailing_comma() {
        let raw = "```json\n{\"verdict\": \"verified\", \"confidence\": 0.9,}\n```";
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_ok());
    }

    #[test]
    fn garbage_fails() {
        let raw = "I believe this claim is probably true.";
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn empty_fails() {
        let parsed: Result<Sample, _> = extract_json("");
        assert!(parsed.is_err());
    }

    #[test]
    fn wrong_shape_fails_even_with_valid_json() {
        // Syntactically valid JSON with missing fields must not pass.
        let raw = r#"{"other_field": true}"#;
        let parsed: Result<Sample, _> = extract_json(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn fenced_block_strips_language_tag() {
        assert_eq!(
            fenced_block("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(fenced_block("```\n{\"a\": 1}\n```"), Some("{\"a\": 1}"));
        assert_eq!(fenced_block("no fence here"), None);
    }

    #[test]
    fn trailing_commas_removed_in_objects_and_arrays() {
        assert_eq!(drop_trailing_commas(r#"{"a": 1, "b": 2,}"#), r#"{"a": 1, "b": 2}"#);
        assert_eq!(drop_trailing_commas("[1, 2, 3,]"), "[1, 2, 3]");
        assert_eq!(drop_trailing_commas("[1, 2,\n  ]"), "[1, 2\n  ]");
    }

    #[test]
    fn commas_inside_strings_are_untouched() {
        let raw = r#"{"notes": "sube, baja, }", "ok": true,}"#;
        assert_eq!(
            drop_trailing_commas(raw),
            r#"{"notes": "sube, baja, }", "ok": true}"#
        );
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let raw = r#"{"notes": "dijo \"sí, }\" ayer",}"#;
        assert_eq!(
            drop_trailing_commas(raw),
            r#"{"notes": "dijo \"sí, }\" ayer"}"#
        );
    }
}
