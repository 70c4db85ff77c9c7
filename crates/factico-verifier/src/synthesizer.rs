//! Deterministic synthesis of sub-agent reports into a final verdict.
//!
//! The synthesizer is pure: the same reports and context always produce
//! the same verdict, which makes the consensus rules directly testable
//! without any provider in the loop.
//!
//! Rules, in order:
//! 1. Zero fetched evidence caps the run at Unverified with strength
//!    `insufficient`.
//! 2. A contextual-manipulation flag from evidence analysis forces
//!    Misleading.
//! 3. Three or more agents agreeing with mean confidence >= 0.7 is that
//!    verdict at strength `strong`.
//! 4. A majority agreeing with mean confidence >= 0.5 is that verdict at
//!    strength `moderate`.
//! 5. A Verified/Debunked split with comparable confidence collapses to
//!    Unverified.
//! 6. Anything else is Unverified at `weak`.

use factico_types::{
    EvidenceStrength, KeyEvidencePoint, SubAgentKind, SubAgentReport, SynthesizedVerdict,
    Verdict, VerificationContext, MAX_EXPLANATION_CHARS,
};

/// Agreement count that makes a verdict `strong`.
const STRONG_AGREEMENT: usize = 3;

/// Mean confidence required for a `strong` verdict.
const STRONG_CONFIDENCE: f64 = 0.7;

/// Mean confidence required for a `moderate` verdict.
const MODERATE_CONFIDENCE: f64 = 0.5;

/// Confidence gap below which a Verified/Debunked split is a tie.
const TIE_MARGIN: f64 = 0.1;

/// Maximum key evidence points attached to a verdict.
const MAX_KEY_POINTS: usize = 5;

/// Fold sub-agent reports into the final verdict.
pub fn synthesize(
    reports: &[SubAgentReport],
    context: &VerificationContext,
) -> SynthesizedVerdict {
    if reports.is_empty() {
        return SynthesizedVerdict {
            verdict: Verdict::Unverified,
            confidence: 0.0,
            strength: EvidenceStrength::Insufficient,
            explanation: "No se pudo completar el análisis del contenido.".to_owned(),
            key_points: Vec::new(),
        };
    }

    let key_points = collect_key_points(reports);

    // Rule 1: nothing was fetched -- the claim cannot be verified this run.
    if context.evidence.is_empty() {
        let confidence = mean_confidence(reports).min(MODERATE_CONFIDENCE);
        return SynthesizedVerdict {
            verdict: Verdict::Unverified,
            confidence,
            strength: EvidenceStrength::Insufficient,
            explanation: cap_explanation(
                "No se obtuvo evidencia verificable para esta afirmación; \
                 no es posible confirmarla ni desmentirla."
                    .to_owned(),
            ),
            key_points,
        };
    }

    // Rule 2: facts present but context manipulated.
    if let Some(manipulation) = reports.iter().find(|r| {
        r.agent == SubAgentKind::EvidenceAnalysis
            && r.contextual_manipulation
            && r.confidence >= MODERATE_CONFIDENCE
    }) {
        let agreeing: Vec<&SubAgentReport> = reports
            .iter()
            .filter(|r| r.leaning == Verdict::Misleading)
            .collect();
        let confidence = if agreeing.is_empty() {
            manipulation.confidence
        } else {
            mean(&agreeing.iter().map(|r| r.confidence).collect::<Vec<_>>())
        };
        return SynthesizedVerdict {
            verdict: Verdict::Misleading,
            confidence,
            strength: EvidenceStrength::Moderate,
            explanation: cap_explanation(explanation_from(manipulation, reports)),
            key_points,
        };
    }

    let (top_verdict, top_count) = leading_verdict(reports);
    let agreeing: Vec<&SubAgentReport> =
        reports.iter().filter(|r| r.leaning == top_verdict).collect();
    let agree_conf = mean(&agreeing.iter().map(|r| r.confidence).collect::<Vec<_>>());

    // Rule 5: a balanced Verified/Debunked split is not a verdict.
    if is_tie(reports, top_count) {
        return SynthesizedVerdict {
            verdict: Verdict::Unverified,
            confidence: mean_confidence(reports).min(MODERATE_CONFIDENCE),
            strength: EvidenceStrength::Weak,
            explanation: cap_explanation(
                "La evidencia disponible es contradictoria; \
                 fuentes comparables apuntan en direcciones opuestas."
                    .to_owned(),
            ),
            key_points,
        };
    }

    // Rule 3: broad high-confidence agreement.
    if top_count >= STRONG_AGREEMENT && agree_conf >= STRONG_CONFIDENCE {
        return SynthesizedVerdict {
            verdict: top_verdict,
            confidence: agree_conf,
            strength: EvidenceStrength::Strong,
            explanation: cap_explanation(best_explanation(&agreeing, reports)),
            key_points,
        };
    }

    // Rule 4: simple majority with moderate confidence.
    let majority = top_count.saturating_mul(2) > reports.len();
    if majority && agree_conf >= MODERATE_CONFIDENCE {
        return SynthesizedVerdict {
            verdict: top_verdict,
            confidence: agree_conf,
            strength: EvidenceStrength::Moderate,
            explanation: cap_explanation(best_explanation(&agreeing, reports)),
            key_points,
        };
    }

    // Rule 6: evidence exists but no consensus formed.
    SynthesizedVerdict {
        verdict: Verdict::Unverified,
        confidence: mean_confidence(reports).min(MODERATE_CONFIDENCE),
        strength: EvidenceStrength::Weak,
        explanation: cap_explanation(
            "La evidencia obtenida no permite confirmar ni desmentir la afirmación."
                .to_owned(),
        ),
        key_points,
    }
}

/// The most common leaning and its count. Ties resolve toward the leaning
/// with the higher mean confidence, which rule 5 then inspects.
fn leading_verdict(reports: &[SubAgentReport]) -> (Verdict, usize) {
    let candidates = [
        Verdict::Verified,
        Verdict::Debunked,
        Verdict::Misleading,
        Verdict::Unverified,
    ];
    let mut best = (Verdict::Unverified, 0_usize, 0.0_f64);
    for verdict in candidates {
        let matching: Vec<&SubAgentReport> =
            reports.iter().filter(|r| r.leaning == verdict).collect();
        let count = matching.len();
        let conf = mean(&matching.iter().map(|r| r.confidence).collect::<Vec<_>>());
        if count > best.1 || (count == best.1 && conf > best.2) {
            best = (verdict, count, conf);
        }
    }
    (best.0, best.1)
}

/// A Verified/Debunked split with equal counts and comparable confidence.
fn is_tie(reports: &[SubAgentReport], top_count: usize) -> bool {
    let verified: Vec<f64> = reports
        .iter()
        .filter(|r| r.leaning == Verdict::Verified)
        .map(|r| r.confidence)
        .collect();
    let debunked: Vec<f64> = reports
        .iter()
        .filter(|r| r.leaning == Verdict::Debunked)
        .map(|r| r.confidence)
        .collect();

    verified.len() == top_count
        && debunked.len() == top_count
        && top_count > 0
        && (mean(&verified) - mean(&debunked)).abs() <= TIE_MARGIN
}

/// Mean of a slice; zero when empty.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    values.iter().sum::<f64>() / len
}

/// Mean confidence across all reports.
fn mean_confidence(reports: &[SubAgentReport]) -> f64 {
    mean(&reports.iter().map(|r| r.confidence).collect::<Vec<_>>())
}

/// Key points from evidence analysis, capped at five.
fn collect_key_points(reports: &[SubAgentReport]) -> Vec<KeyEvidencePoint> {
    reports
        .iter()
        .filter(|r| r.agent == SubAgentKind::EvidenceAnalysis)
        .flat_map(|r| r.key_points.iter().cloned())
        .take(MAX_KEY_POINTS)
        .collect()
}

/// The explanation from the highest-confidence agreeing agent, with the
/// evidence-analysis notes preferred when available.
fn best_explanation(agreeing: &[&SubAgentReport], all: &[SubAgentReport]) -> String {
    let evidence_note = all
        .iter()
        .find(|r| r.agent == SubAgentKind::EvidenceAnalysis && !r.notes.trim().is_empty())
        .map(|r| r.notes.trim().to_owned());

    evidence_note.unwrap_or_else(|| {
        agreeing
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|r| r.notes.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Resultado basado en el análisis combinado de evidencia.".to_owned())
    })
}

/// Explanation for the Misleading path: the manipulation note leads.
fn explanation_from(manipulation: &SubAgentReport, all: &[SubAgentReport]) -> String {
    if manipulation.notes.trim().is_empty() {
        best_explanation(&all.iter().collect::<Vec<_>>(), all)
    } else {
        manipulation.notes.trim().to_owned()
    }
}

/// Hard cap at the reader-facing explanation limit.
fn cap_explanation(text: String) -> String {
    if text.chars().count() <= MAX_EXPLANATION_CHARS {
        text
    } else {
        text.chars().take(MAX_EXPLANATION_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factico_types::EvidenceDoc;

    fn report(agent: SubAgentKind, leaning: Verdict, confidence: f64) -> SubAgentReport {
        SubAgentReport {
            agent,
            leaning,
            confidence,
            notes: String::new(),
            contextual_manipulation: false,
            key_points: Vec::new(),
        }
    }

    fn context_with_evidence(count: usize) -> VerificationContext {
        VerificationContext {
            claim_text: "El banco central subió la tasa a 11.00%".to_owned(),
            origin_url: None,
            similar_claims: Vec::new(),
            evidence: (0..count)
                .map(|i| EvidenceDoc {
                    url: format!("https://example.mx/{i}"),
                    domain: "example.mx".to_owned(),
                    title: "Nota".to_owned(),
                    text: "texto".to_owned(),
                    fetched_at: chrono::Utc::now(),
                    tier: factico_types::CredibilityTier::VettedPress,
                    relevance: 0.8,
                })
                .collect(),
            credibility: std::collections::BTreeMap::new(),
            entity_hints: Vec::new(),
            duplicate_of: None,
        }
    }

    #[test]
    fn strong_consensus_verifies() {
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.9),
            report(SubAgentKind::HistoricalContext, Verdict::Verified, 0.8),
            report(SubAgentKind::LogicalConsistency, Verdict::Verified, 0.85),
            report(SubAgentKind::EvidenceAnalysis, Verdict::Verified, 0.9),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(3));
        assert_eq!(verdict.verdict, Verdict::Verified);
        assert_eq!(verdict.strength, EvidenceStrength::Strong);
        assert!(verdict.confidence >= 0.8);
    }

    #[test]
    fn majority_moderate() {
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Debunked, 0.6),
            report(SubAgentKind::HistoricalContext, Verdict::Debunked, 0.55),
            report(SubAgentKind::LogicalConsistency, Verdict::Debunked, 0.6),
            report(SubAgentKind::EvidenceAnalysis, Verdict::Unverified, 0.4),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(2));
        assert_eq!(verdict.verdict, Verdict::Debunked);
        // Three agree, but their mean confidence (0.583) is below the
        // strong threshold, so the verdict stays moderate.
        assert_eq!(verdict.strength, EvidenceStrength::Moderate);
    }

    #[test]
    fn zero_evidence_is_unverified_insufficient() {
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.9),
            report(SubAgentKind::HistoricalContext, Verdict::Verified, 0.9),
            report(SubAgentKind::LogicalConsistency, Verdict::Verified, 0.9),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(0));
        assert_eq!(verdict.verdict, Verdict::Unverified);
        assert_eq!(verdict.strength, EvidenceStrength::Insufficient);
        assert!(verdict.confidence <= 0.5, "zero evidence caps confidence");
    }

    #[test]
    fn manipulation_forces_misleading() {
        let mut evidence_report =
            report(SubAgentKind::EvidenceAnalysis, Verdict::Misleading, 0.7);
        evidence_report.contextual_manipulation = true;
        evidence_report.notes =
            "La caída del 50% es mensual y estatal; la cifra anual nacional la contradice."
                .to_owned();
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.6),
            report(SubAgentKind::HistoricalContext, Verdict::Unverified, 0.5),
            report(SubAgentKind::LogicalConsistency, Verdict::Misleading, 0.65),
            evidence_report,
        ];
        let verdict = synthesize(&reports, &context_with_evidence(3));
        assert_eq!(verdict.verdict, Verdict::Misleading);
        assert_eq!(verdict.strength, EvidenceStrength::Moderate);
        assert!(verdict.explanation.contains("mensual"));
    }

    #[test]
    fn verified_debunked_tie_collapses_to_unverified() {
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.7),
            report(SubAgentKind::HistoricalContext, Verdict::Verified, 0.7),
            report(SubAgentKind::LogicalConsistency, Verdict::Debunked, 0.72),
            report(SubAgentKind::EvidenceAnalysis, Verdict::Debunked, 0.68),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(4));
        assert_eq!(verdict.verdict, Verdict::Unverified);
    }

    #[test]
    fn no_consensus_is_weak() {
        let reports = vec![
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.4),
            report(SubAgentKind::HistoricalContext, Verdict::Unverified, 0.4),
            report(SubAgentKind::LogicalConsistency, Verdict::Misleading, 0.35),
            report(SubAgentKind::EvidenceAnalysis, Verdict::Unverified, 0.45),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(1));
        assert_eq!(verdict.verdict, Verdict::Unverified);
        assert_eq!(verdict.strength, EvidenceStrength::Weak);
    }

    #[test]
    fn explanation_is_hard_capped() {
        let mut long_report = report(SubAgentKind::EvidenceAnalysis, Verdict::Verified, 0.9);
        long_report.notes = "x".repeat(600);
        let reports = vec![
            long_report,
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.9),
            report(SubAgentKind::HistoricalContext, Verdict::Verified, 0.9),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(2));
        assert!(verdict.explanation.chars().count() <= MAX_EXPLANATION_CHARS);
    }

    #[test]
    fn key_points_capped_at_five() {
        let mut evidence_report =
            report(SubAgentKind::EvidenceAnalysis, Verdict::Verified, 0.9);
        evidence_report.key_points = (0..8)
            .map(|i| KeyEvidencePoint {
                summary: format!("punto {i}"),
                url: None,
                supports: true,
            })
            .collect();
        let reports = vec![
            evidence_report,
            report(SubAgentKind::SourceCredibility, Verdict::Verified, 0.9),
            report(SubAgentKind::HistoricalContext, Verdict::Verified, 0.9),
        ];
        let verdict = synthesize(&reports, &context_with_evidence(2));
        assert_eq!(verdict.key_points.len(), 5);
    }

    #[test]
    fn empty_reports_unverified() {
        let verdict = synthesize(&[], &context_with_evidence(2));
        assert_eq!(verdict.verdict, Verdict::Unverified);
        assert_eq!(verdict.strength, EvidenceStrength::Insufficient);
    }
}
