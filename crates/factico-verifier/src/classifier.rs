//! Entity and topic classification for persisted claims.
//!
//! Two independent LLM calls: one extracts named entities, one assigns
//! topics from the fixed taxonomy. Entity surface forms are canonicalized
//! through a rule-based alias map before they reach the database; topics
//! below the confidence threshold are not linked.

use factico_types::{EntityHint, EntityKind, Topic, TopicId};
use tracing::warn;

use crate::error::VerifierError;
use crate::prompt::PromptEngine;
use crate::provider::{CompletionRequest, ProviderPair};

/// Sampling temperature for classification.
const CLASSIFY_TEMPERATURE: f64 = 0.2;

/// Output token cap for classification calls.
const CLASSIFY_MAX_TOKENS: u32 = 500;

/// Minimum classifier confidence for a topic to be linked.
const TOPIC_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Maximum topics linked per claim.
const MAX_TOPICS: usize = 3;

/// Alias map applied before entity insert. Surface forms are matched
/// case-insensitively; unmatched forms pass through trimmed.
const ENTITY_ALIASES: [(&str, &str); 8] = [
    ("banxico", "Banco de México"),
    ("banco central", "Banco de México"),
    ("inegi", "INEGI"),
    ("la corte", "Suprema Corte de Justicia de la Nación"),
    ("scjn", "Suprema Corte de Justicia de la Nación"),
    ("hacienda", "Secretaría de Hacienda y Crédito Público"),
    ("shcp", "Secretaría de Hacienda y Crédito Público"),
    ("ine", "Instituto Nacional Electoral"),
];

/// A canonicalized entity ready for linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEntity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Canonical name after alias resolution.
    pub canonical_name: String,
}

/// A topic assignment above the confidence threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicAssignment {
    /// The taxonomy topic.
    pub topic_id: TopicId,
    /// Classifier confidence.
    pub confidence: f64,
}

/// Raw JSON shape of the entity classification call.
#[derive(Debug, serde::Deserialize)]
struct RawEntities {
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Debug, serde::Deserialize)]
struct RawEntity {
    kind: String,
    surface_form: String,
}

/// Raw JSON shape of the topic classification call.
#[derive(Debug, serde::Deserialize)]
struct RawTopics {
    #[serde(default)]
    topics: Vec<RawTopic>,
}

#[derive(Debug, serde::Deserialize)]
struct RawTopic {
    slug: String,
    confidence: f64,
}

/// The entity/topic classifier.
pub struct Classifier<'a> {
    providers: &'a ProviderPair,
    prompts: &'a PromptEngine,
}

impl<'a> Classifier<'a> {
    /// Create a classifier over a provider pair and prompt engine.
    pub const fn new(providers: &'a ProviderPair, prompts: &'a PromptEngine) -> Self {
        Self { providers, prompts }
    }

    /// Extract and canonicalize named entities from a claim.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifierError`] when the provider call fails.
    pub async fn entities(&self, claim_text: &str) -> Result<Vec<CanonicalEntity>, VerifierError> {
        let context = serde_json::json!({ "claim_text": claim_text });
        let prompt =
            self.prompts
                .render_pair("classifier_system.j2", "classify_entities.j2", &context)?;

        let raw: RawEntities = self
            .providers
            .complete_json(&CompletionRequest {
                system: prompt.system,
                user: prompt.user,
                max_tokens: CLASSIFY_MAX_TOKENS,
                temperature: CLASSIFY_TEMPERATURE,
            })
            .await?;

        Ok(raw
            .entities
            .into_iter()
            .filter_map(|e| {
                let Some(kind) = EntityKind::parse(&e.kind) else {
                    warn!(kind = e.kind, "unknown entity kind, dropping");
                    return None;
                };
                let canonical_name = canonicalize(&e.surface_form);
                if canonical_name.is_empty() {
                    return None;
                }
                Some(CanonicalEntity {
                    kind,
                    canonical_name,
                })
            })
            .collect())
    }

    /// Assign one to three taxonomy topics to a claim.
    ///
    /// Slugs outside the taxonomy and assignments below the confidence
    /// threshold are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifierError`] when the provider call fails.
    pub async fn topics(
        &self,
        claim_text: &str,
        taxonomy: &[Topic],
    ) -> Result<Vec<TopicAssignment>, VerifierError> {
        let context = serde_json::json!({
            "claim_text": claim_text,
            "taxonomy": taxonomy
                .iter()
                .map(|t| serde_json::json!({ "slug": t.taxonomy_slug, "name": t.name }))
                .collect::<Vec<_>>(),
        });
        let prompt =
            self.prompts
                .render_pair("classifier_system.j2", "classify_topics.j2", &context)?;

        let raw: RawTopics = self
            .providers
            .complete_json(&CompletionRequest {
                system: prompt.system,
                user: prompt.user,
                max_tokens: CLASSIFY_MAX_TOKENS,
                temperature: CLASSIFY_TEMPERATURE,
            })
            .await?;

        let mut assignments: Vec<TopicAssignment> = raw
            .topics
            .into_iter()
            .filter(|t| t.confidence >= TOPIC_CONFIDENCE_THRESHOLD)
            .filter_map(|t| {
                let topic = taxonomy.iter().find(|x| x.taxonomy_slug == t.slug);
                if topic.is_none() {
                    warn!(slug = t.slug, "classifier returned unknown topic slug");
                }
                topic.map(|topic| TopicAssignment {
                    topic_id: topic.id,
                    confidence: t.confidence.clamp(0.0, 1.0),
                })
            })
            .collect();

        assignments.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        assignments.truncate(MAX_TOPICS);
        Ok(assignments)
    }
}

/// Resolve a surface form to its canonical name.
pub fn canonicalize(surface_form: &str) -> String {
    let trimmed = surface_form.trim();
    let lowered = trimmed.to_lowercase();
    ENTITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or_else(|| trimmed.to_owned(), |(_, canonical)| (*canonical).to_owned())
}

/// Pre-extract entity hints from a claim without an LLM call.
///
/// A cheap lexical pass used by the RAG builder: alias-map hits become
/// institution hints so the orchestrator sees them even before the full
/// classifier runs.
pub fn lexical_entity_hints(claim_text: &str) -> Vec<EntityHint> {
    let lowered = claim_text.to_lowercase();
    let mut hints = Vec::new();
    for (alias, canonical) in ENTITY_ALIASES {
        if lowered.contains(alias)
            && !hints
                .iter()
                .any(|h: &EntityHint| h.surface_form == canonical)
        {
            hints.push(EntityHint {
                kind: EntityKind::Institution,
                surface_form: canonical.to_owned(),
            });
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_resolves_aliases() {
        assert_eq!(canonicalize("Banxico"), "Banco de México");
        assert_eq!(canonicalize("banco central"), "Banco de México");
        assert_eq!(canonicalize("SCJN"), "Suprema Corte de Justicia de la Nación");
    }

    #[test]
    fn canonicalize_passes_unknown_through() {
        assert_eq!(canonicalize("  Claudia Sheinbaum "), "Claudia Sheinbaum");
    }

    #[test]
    fn lexical_hints_deduplicate() {
        let hints =
            lexical_entity_hints("Banxico y el banco central subieron la tasa de referencia");
        // Both aliases resolve to the same canonical name; one hint only.
        assert_eq!(hints.len(), 1);
        assert_eq!(hints.first().map(|h| h.surface_form.as_str()),
            Some("Banco de México"));
    }

    #[test]
    fn lexical_hints_empty_for_plain_text() {
        assert!(lexical_entity_hints("Mañana lloverá en la capital").is_empty());
    }
}
