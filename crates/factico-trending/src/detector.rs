//! Trending topic scoring over the rolling source window.
//!
//! For each candidate phrase the detector computes: trend score
//! (recent frequency against the baseline half of the window), velocity
//! (frequency slope), cross-platform correlation (platforms seen over
//! total platforms), taxonomy relevance, and misinformation risk (the
//! share of linked claims debunked or judged misleading). The weighted
//! priority ranks the snapshot.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use factico_types::{Platform, TrendId, TrendingTopic, Verdict};
use tracing::debug;

use crate::ngram::{mentions, phrase_counts};

/// A document in the rolling window (a source with its claim verdict).
#[derive(Debug, Clone)]
pub struct TrendDoc {
    /// Platform the source came from.
    pub platform: Platform,
    /// Normalized content.
    pub content: String,
    /// Ingestion time.
    pub captured_at: DateTime<Utc>,
    /// Verdict of the linked claim, when processed.
    pub verdict: Option<Verdict>,
}

/// Priority weights, configured by the operator.
#[derive(Debug, Clone, Copy)]
pub struct TrendWeights {
    /// Weight of the trend score.
    pub trend: f64,
    /// Weight of the velocity.
    pub velocity: f64,
    /// Weight of the cross-platform correlation.
    pub correlation: f64,
    /// Weight of the taxonomy relevance.
    pub relevance: f64,
    /// Weight of the misinformation risk.
    pub risk: f64,
}

impl Default for TrendWeights {
    fn default() -> Self {
        Self {
            trend: 0.3,
            velocity: 0.2,
            correlation: 0.15,
            relevance: 0.15,
            risk: 0.2,
        }
    }
}

/// Minimum mentions in the window for a phrase to be a candidate.
const MIN_MENTIONS: u64 = 3;

/// Trend score is normalized against this cap when weighted.
const TREND_SCORE_CAP: f64 = 5.0;

/// Detect trending topics over the window.
///
/// `taxonomy_names` are the topic display names used for relevance
/// scoring; `top_n` bounds the snapshot size.
pub fn detect(
    docs: &[TrendDoc],
    taxonomy_names: &[String],
    weights: TrendWeights,
    top_n: usize,
) -> Vec<TrendingTopic> {
    if docs.is_empty() {
        return Vec::new();
    }

    let midpoint = window_midpoint(docs);
    let (baseline, recent): (Vec<&TrendDoc>, Vec<&TrendDoc>) =
        docs.iter().partition(|d| d.captured_at < midpoint);

    let counts = phrase_counts(docs.iter().map(|d| d.content.as_str()));
    let now = Utc::now();

    let mut topics: Vec<TrendingTopic> = counts
        .into_iter()
        .filter(|(phrase, count)| *count >= MIN_MENTIONS && phrase.contains(' '))
        .map(|(phrase, _)| score_phrase(&phrase, docs, &baseline, &recent, taxonomy_names, weights, now))
        .collect();

    topics.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    dedup_subphrases(&mut topics);
    topics.truncate(top_n);
    debug!(candidates = topics.len(), "trending detection completed");
    topics
}

/// Score one candidate phrase.
fn score_phrase(
    phrase: &str,
    docs: &[TrendDoc],
    baseline: &[&TrendDoc],
    recent: &[&TrendDoc],
    taxonomy_names: &[String],
    weights: TrendWeights,
    now: DateTime<Utc>,
) -> TrendingTopic {
    let mentioning: Vec<&TrendDoc> = docs.iter().filter(|d| mentions(&d.content, phrase)).collect();
    let baseline_count = baseline
        .iter()
        .filter(|d| mentions(&d.content, phrase))
        .count();
    let recent_count = recent
        .iter()
        .filter(|d| mentions(&d.content, phrase))
        .count();

    #[allow(clippy::cast_precision_loss)]
    let (baseline_f, recent_f, total_f) = (
        baseline_count as f64,
        recent_count as f64,
        mentioning.len() as f64,
    );

    let trend_score = recent_f / baseline_f.max(1.0);
    let velocity = (recent_f - baseline_f) / total_f.max(1.0);

    let platforms_seen: HashSet<&str> =
        mentioning.iter().map(|d| d.platform.as_str()).collect();
    #[allow(clippy::cast_precision_loss)]
    let correlation = platforms_seen.len() as f64 / Platform::ALL_SCRAPED.len() as f64;

    let relevance = taxonomy_relevance(phrase, taxonomy_names);

    let risky = mentioning
        .iter()
        .filter(|d| matches!(d.verdict, Some(Verdict::Debunked | Verdict::Misleading)))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let misinformation_risk = if mentioning.is_empty() {
        0.0
    } else {
        risky as f64 / mentioning.len() as f64
    };

    let normalized_trend = (trend_score / TREND_SCORE_CAP).clamp(0.0, 1.0);
    let normalized_velocity = velocity.clamp(-1.0, 1.0).mul_add(0.5, 0.5);
    let priority = weights.trend.mul_add(
        normalized_trend,
        weights.velocity.mul_add(
            normalized_velocity,
            weights.correlation.mul_add(
                correlation,
                weights
                    .relevance
                    .mul_add(relevance, weights.risk * misinformation_risk),
            ),
        ),
    );

    TrendingTopic {
        id: TrendId::new(),
        name: phrase.to_owned(),
        keywords: phrase.split(' ').map(ToOwned::to_owned).collect(),
        trend_score,
        velocity,
        correlation,
        relevance,
        misinformation_risk,
        priority,
        detected_at: now,
    }
}

/// Fraction of phrase tokens that appear in any taxonomy name.
fn taxonomy_relevance(phrase: &str, taxonomy_names: &[String]) -> f64 {
    let tokens: Vec<&str> = phrase.split(' ').collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let lowered: Vec<String> = taxonomy_names.iter().map(|n| n.to_lowercase()).collect();
    let matched = tokens
        .iter()
        .filter(|token| lowered.iter().any(|name| name.contains(*token)))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let fraction = matched as f64 / tokens.len() as f64;
    fraction
}

/// Drop lower-priority phrases fully contained in a kept phrase, so the
/// snapshot does not list "banco central" and "banco" separately.
fn dedup_subphrases(topics: &mut Vec<TrendingTopic>) {
    let mut kept: Vec<String> = Vec::new();
    topics.retain(|topic| {
        let contained = kept.iter().any(|k| {
            k.contains(&topic.name) || topic.name.contains(k.as_str())
        });
        if contained {
            false
        } else {
            kept.push(topic.name.clone());
            true
        }
    });
}

/// The midpoint of the observed window.
fn window_midpoint(docs: &[TrendDoc]) -> DateTime<Utc> {
    let min = docs.iter().map(|d| d.captured_at).min();
    let max = docs.iter().map(|d| d.captured_at).max();
    match (min, max) {
        (Some(min), Some(max)) => min + (max - min) / 2,
        _ => Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc(
        platform: Platform,
        content: &str,
        hours_ago: i64,
        verdict: Option<Verdict>,
    ) -> TrendDoc {
        TrendDoc {
            platform,
            content: content.to_owned(),
            captured_at: Utc::now() - Duration::hours(hours_ago),
            verdict,
        }
    }

    fn surge_docs() -> Vec<TrendDoc> {
        let mut docs = vec![
            // Baseline half: one mention.
            doc(Platform::NewsRss, "reforma electoral en debate", 20, None),
            doc(Platform::NewsRss, "clima para mañana", 22, None),
            doc(Platform::Forum, "resultados de futbol", 21, None),
        ];
        // Recent half: a surge across platforms.
        for i in 0..4 {
            docs.push(doc(
                Platform::SocialShort,
                "reforma electoral aprobada sin quorum",
                3 + i,
                Some(Verdict::Debunked),
            ));
        }
        docs.push(doc(
            Platform::NewsRss,
            "debaten la reforma electoral en el pleno",
            2,
            Some(Verdict::Verified),
        ));
        docs.push(doc(
            Platform::Video,
            "análisis de la reforma electoral",
            1,
            None,
        ));
        docs
    }

    #[test]
    fn surging_phrase_is_detected() {
        let topics = detect(
            &surge_docs(),
            &["Reforma Electoral".to_owned(), "Economía".to_owned()],
            TrendWeights::default(),
            10,
        );
        let top = topics.first();
        assert!(
            top.is_some_and(|t| t.name.contains("reforma electoral")),
            "the surging phrase should lead the snapshot: {topics:?}"
        );
    }

    #[test]
    fn risk_reflects_debunked_share() {
        let topics = detect(
            &surge_docs(),
            &[],
            TrendWeights::default(),
            10,
        );
        let top = topics
            .iter()
            .find(|t| t.name.contains("reforma electoral"));
        assert!(top.is_some_and(|t| t.misinformation_risk > 0.0));
        assert!(top.is_some_and(|t| t.misinformation_risk < 1.0));
    }

    #[test]
    fn correlation_counts_platforms() {
        let topics = detect(&surge_docs(), &[], TrendWeights::default(), 10);
        let top = topics
            .iter()
            .find(|t| t.name.contains("reforma electoral"));
        // Seen on social, rss, and video: 3 of 4 platforms.
        assert!(top.is_some_and(|t| (t.correlation - 0.75).abs() < 1e-9));
    }

    #[test]
    fn empty_window_is_empty_snapshot() {
        assert!(detect(&[], &[], TrendWeights::default(), 10).is_empty());
    }

    #[test]
    fn snapshot_is_bounded() {
        let mut docs = Vec::new();
        for i in 0..40 {
            for _ in 0..3 {
                docs.push(doc(
                    Platform::SocialShort,
                    &format!("tema distinto numero{i} crece rapido{i}"),
                    1,
                    None,
                ));
            }
        }
        let topics = detect(&docs, &[], TrendWeights::default(), 5);
        assert!(topics.len() <= 5);
    }

    #[test]
    fn subphrases_are_deduplicated() {
        let topics = detect(&surge_docs(), &[], TrendWeights::default(), 10);
        let full = topics.iter().any(|t| t.name == "reforma electoral");
        if full {
            assert!(
                !topics.iter().any(|t| t.name == "reforma"),
                "contained subphrase should be dropped"
            );
        }
    }
}
