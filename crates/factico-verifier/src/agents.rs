//! The verification orchestrator: four sub-agents over one context.
//!
//! Sub-agents run as independent concurrent LLM calls sharing the same
//! immutable [`VerificationContext`]; none mutates shared state. Each
//! returns a leaning, a confidence, and notes. The deterministic
//! synthesizer (see [`crate::synthesizer`]) folds the reports into the
//! final verdict.
//!
//! Failure semantics: a failed sub-agent is dropped; synthesis proceeds
//! from the survivors as long as at least two succeeded. Fewer than two
//! is a transient error -- the task layer retries. The whole fan-out runs
//! under a wall-clock budget.

use std::time::Duration;

use factico_types::{
    KeyEvidencePoint, SubAgentKind, SubAgentReport, SynthesizedVerdict, Verdict,
    VerificationContext,
};
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::VerifierError;
use crate::prompt::PromptEngine;
use crate::provider::{CompletionRequest, ProviderPair};
use crate::synthesizer::synthesize;

/// Default wall-clock budget for the whole orchestrator run.
pub const DEFAULT_ORCHESTRATOR_BUDGET: Duration = Duration::from_secs(45);

/// Sampling temperature for sub-agents.
const AGENT_TEMPERATURE: f64 = 0.2;

/// Output token cap per sub-agent.
const AGENT_MAX_TOKENS: u32 = 700;

/// Minimum surviving sub-agents required for synthesis.
const MIN_REPORTS: usize = 2;

/// Raw JSON shape each sub-agent prompt asks for.
#[derive(Debug, serde::Deserialize)]
struct RawReport {
    leaning: String,
    confidence: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    contextual_manipulation: Option<bool>,
    #[serde(default)]
    key_points: Option<Vec<RawKeyPoint>>,
}

/// Raw key evidence point inside an evidence-analysis report.
#[derive(Debug, serde::Deserialize)]
struct RawKeyPoint {
    summary: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    supports: Option<bool>,
}

/// The multi-agent verification orchestrator.
pub struct Orchestrator<'a> {
    providers: &'a ProviderPair,
    prompts: &'a PromptEngine,
    budget: Duration,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator with the default wall-clock budget.
    pub const fn new(providers: &'a ProviderPair, prompts: &'a PromptEngine) -> Self {
        Self {
            providers,
            prompts,
            budget: DEFAULT_ORCHESTRATOR_BUDGET,
        }
    }

    /// Override the wall-clock budget.
    #[must_use]
    pub const fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Run all four sub-agents and synthesize a verdict.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::ProviderTransient`] when fewer than two
    /// sub-agents succeed (the task layer retries), or
    /// [`VerifierError::Template`] when a prompt cannot be rendered.
    pub async fn verify(
        &self,
        context: &VerificationContext,
    ) -> Result<SynthesizedVerdict, VerifierError> {
        let context_json = serde_json::to_value(context)
            .map_err(|e| VerifierError::Parse(format!("context serialization failed: {e}")))?;

        let futures = SubAgentKind::ALL
            .into_iter()
            .map(|kind| self.run_agent(kind, &context_json));

        let reports: Vec<SubAgentReport> = match timeout(self.budget, join_all(futures)).await {
            Ok(results) => results.into_iter().flatten().collect(),
            Err(_) => {
                warn!(budget = ?self.budget, "orchestrator budget exhausted");
                Vec::new()
            }
        };

        if reports.len() < MIN_REPORTS {
            return Err(VerifierError::ProviderTransient(format!(
                "only {} of {} sub-agents succeeded",
                reports.len(),
                SubAgentKind::ALL.len()
            )));
        }

        let verdict = synthesize(&reports, context);
        info!(
            verdict = verdict.verdict.as_str(),
            confidence = verdict.confidence,
            strength = verdict.strength.as_str(),
            reports = reports.len(),
            "verdict synthesized"
        );
        Ok(verdict)
    }

    /// Run one sub-agent; failures are logged and become `None`.
    async fn run_agent(
        &self,
        kind: SubAgentKind,
        context_json: &serde_json::Value,
    ) -> Option<SubAgentReport> {
        let user_template = format!("subagent_{}.j2", kind.as_str());
        let prompt = match self
            .prompts
            .render_pair("subagent_system.j2", &user_template, context_json)
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(agent = kind.as_str(), error = %e, "sub-agent prompt render failed");
                return None;
            }
        };

        let raw: RawReport = match self
            .providers
            .complete_json(&CompletionRequest {
                system: prompt.system,
                user: prompt.user,
                max_tokens: AGENT_MAX_TOKENS,
                temperature: AGENT_TEMPERATURE,
            })
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(agent = kind.as_str(), error = %e, "sub-agent call failed");
                return None;
            }
        };

        convert_report(kind, raw)
    }
}

/// Validate a raw report against the closed vocabulary.
///
/// An unknown leaning string invalidates the whole report -- a sub-agent
/// that cannot follow the output contract is not trusted for this claim.
fn convert_report(kind: SubAgentKind, raw: RawReport) -> Option<SubAgentReport> {
    let Some(leaning) = Verdict::parse(&raw.leaning) else {
        warn!(
            agent = kind.as_str(),
            leaning = raw.leaning,
            "sub-agent returned unknown leaning, dropping report"
        );
        return None;
    };

    let key_points = raw
        .key_points
        .unwrap_or_default()
        .into_iter()
        .map(|p| KeyEvidencePoint {
            summary: p.summary,
            url: p.url,
            supports: p.supports.unwrap_or(true),
        })
        .collect();

    Some(SubAgentReport {
        agent: kind,
        leaning,
        confidence: raw.confidence.clamp(0.0, 1.0),
        notes: raw.notes.unwrap_or_default(),
        contextual_manipulation: raw.contextual_manipulation.unwrap_or(false),
        key_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_leaning_drops_report() {
        let raw = RawReport {
            leaning: "mostly-true".to_owned(),
            confidence: 0.9,
            notes: None,
            contextual_manipulation: None,
            key_points: None,
        };
        assert!(convert_report(SubAgentKind::LogicalConsistency, raw).is_none());
    }

    #[test]
    fn confidence_is_clamped() {
        let raw = RawReport {
            leaning: "Verified".to_owned(),
            confidence: 1.7,
            notes: Some("fuerte respaldo oficial".to_owned()),
            contextual_manipulation: None,
            key_points: None,
        };
        let report = convert_report(SubAgentKind::SourceCredibility, raw);
        assert!(report.is_some_and(|r| (r.confidence - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn key_points_carry_through() {
        let raw = RawReport {
            leaning: "verified".to_owned(),
            confidence: 0.8,
            notes: None,
            contextual_manipulation: Some(false),
            key_points: Some(vec![RawKeyPoint {
                summary: "El comunicado oficial confirma la cifra".to_owned(),
                url: Some("https://banxico.org.mx/comunicado".to_owned()),
                supports: Some(true),
            }]),
        };
        let report = convert_report(SubAgentKind::EvidenceAnalysis, raw);
        assert!(report.is_some_and(|r| r.key_points.len() == 1));
    }
}
