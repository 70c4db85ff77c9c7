//! Claim extraction: raw source text to a single neutral factual claim.
//!
//! One LLM call per source at low temperature. The model either produces a
//! normalized claim in neutral formal Spanish or a skip decision (opinion,
//! insult, advertisement, exhortation, empty). A skip terminates the
//! source without creating a claim.

use factico_types::{ExtractionOutcome, SkipReason, MAX_CLAIM_CHARS};
use tracing::{debug, warn};

use crate::error::VerifierError;
use crate::prompt::PromptEngine;
use crate::provider::{CompletionRequest, ProviderPair};

/// Sampling temperature for extraction (determinism over creativity).
const EXTRACT_TEMPERATURE: f64 = 0.2;

/// Output token cap for extraction.
const EXTRACT_MAX_TOKENS: u32 = 400;

/// Raw JSON shape the extraction prompt asks for.
#[derive(Debug, serde::Deserialize)]
struct RawExtraction {
    decision: String,
    #[serde(default)]
    claim: Option<String>,
    #[serde(default)]
    skip_reason: Option<String>,
}

/// The claim extractor.
pub struct ClaimExtractor<'a> {
    providers: &'a ProviderPair,
    prompts: &'a PromptEngine,
}

impl<'a> ClaimExtractor<'a> {
    /// Create an extractor over a provider pair and prompt engine.
    pub const fn new(providers: &'a ProviderPair, prompts: &'a PromptEngine) -> Self {
        Self { providers, prompts }
    }

    /// Extract a claim (or a skip decision) from source content.
    ///
    /// Empty or whitespace-only content skips without an LLM call.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifierError`] when the provider call fails; the task
    /// layer retries transients and escalates hard failures.
    pub async fn extract(
        &self,
        content: &str,
        author: &str,
        platform: &str,
    ) -> Result<ExtractionOutcome, VerifierError> {
        if content.trim().is_empty() {
            return Ok(ExtractionOutcome::Skip(SkipReason::EmptyOrAmbiguous));
        }

        let context = serde_json::json!({
            "content": content,
            "author": author,
            "platform": platform,
        });
        let prompt = self
            .prompts
            .render_pair("extract_system.j2", "extract_user.j2", &context)?;

        let raw: RawExtraction = self
            .providers
            .complete_json(&CompletionRequest {
                system: prompt.system,
                user: prompt.user,
                max_tokens: EXTRACT_MAX_TOKENS,
                temperature: EXTRACT_TEMPERATURE,
            })
            .await?;

        Ok(Self::interpret(raw))
    }

    /// Map the raw model output onto the closed outcome type.
    fn interpret(raw: RawExtraction) -> ExtractionOutcome {
        let decision = raw.decision.to_lowercase();
        if decision == "skip" {
            let reason = raw
                .skip_reason
                .as_deref()
                .and_then(SkipReason::parse)
                .unwrap_or(SkipReason::EmptyOrAmbiguous);
            debug!(reason = reason.as_str(), "extractor skipped source");
            return ExtractionOutcome::Skip(reason);
        }

        match raw.claim {
            Some(text) if !text.trim().is_empty() => {
                let normalized: String = text.trim().chars().take(MAX_CLAIM_CHARS).collect();
                ExtractionOutcome::Claim(normalized)
            }
            _ => {
                warn!(
                    decision = decision,
                    "extractor returned claim decision without claim text, skipping"
                );
                ExtractionOutcome::Skip(SkipReason::EmptyOrAmbiguous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_with_known_reason() {
        let raw = RawExtraction {
            decision: "skip".to_owned(),
            claim: None,
            skip_reason: Some("opinion".to_owned()),
        };
        assert_eq!(
            ClaimExtractor::interpret(raw),
            ExtractionOutcome::Skip(SkipReason::Opinion)
        );
    }

    #[test]
    fn skip_with_unknown_reason_defaults() {
        let raw = RawExtraction {
            decision: "SKIP".to_owned(),
            claim: None,
            skip_reason: Some("boring".to_owned()),
        };
        assert_eq!(
            ClaimExtractor::interpret(raw),
            ExtractionOutcome::Skip(SkipReason::EmptyOrAmbiguous)
        );
    }

    #[test]
    fn claim_is_trimmed_and_capped() {
        let long_claim = "x".repeat(900);
        let raw = RawExtraction {
            decision: "claim".to_owned(),
            claim: Some(format!("  {long_claim}  ")),
            skip_reason: None,
        };
        let text = match ClaimExtractor::interpret(raw) {
            ExtractionOutcome::Claim(text) => text,
            ExtractionOutcome::Skip(_) => String::new(),
        };
        assert_eq!(text.chars().count(), MAX_CLAIM_CHARS);
    }

    #[test]
    fn claim_decision_without_text_skips() {
        let raw = RawExtraction {
            decision: "claim".to_owned(),
            claim: Some("   ".to_owned()),
            skip_reason: None,
        };
        assert_eq!(
            ClaimExtractor::interpret(raw),
            ExtractionOutcome::Skip(SkipReason::EmptyOrAmbiguous)
        );
    }
}
