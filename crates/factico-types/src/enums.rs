//! Enumeration types for the Factico pipeline.
//!
//! Every closed vocabulary in the data model lives here: platforms, source
//! lifecycle states, verdicts, evidence strength, review priorities, entity
//! kinds, market state, credibility tiers, skip reasons, and task kinds.
//!
//! Each enum that is persisted or parsed from LLM output carries an
//! `as_str` / `parse` pair. Parsing is strict: unknown strings are `None`,
//! never silently mapped to a default (callers decide the fallback).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Platforms and source lifecycle
// ---------------------------------------------------------------------------

/// The platform a source was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Short-post social network (microblogging).
    SocialShort,
    /// News site RSS feed.
    NewsRss,
    /// Video platform (transcripts).
    Video,
    /// Community discussion forum.
    Forum,
    /// Generic web page (evidence fetches, manual submissions).
    Web,
}

impl Platform {
    /// Stable string form used in the database and task payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SocialShort => "social_short",
            Self::NewsRss => "news_rss",
            Self::Video => "video",
            Self::Forum => "forum",
            Self::Web => "web",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "social_short" => Some(Self::SocialShort),
            "news_rss" => Some(Self::NewsRss),
            "video" => Some(Self::Video),
            "forum" => Some(Self::Forum),
            "web" => Some(Self::Web),
            _ => None,
        }
    }

    /// All platforms a scraper can produce, used for cross-platform
    /// correlation in trend scoring.
    pub const ALL_SCRAPED: [Self; 4] = [Self::SocialShort, Self::NewsRss, Self::Video, Self::Forum];
}

/// Lifecycle state of a scraped source.
///
/// Transitions are monotonic toward a terminal state: `Pending` sources are
/// claimed by a worker and end as `Processed`, `Skipped`, or `Failed`.
/// A `Failed` source with fewer than three attempts is retried after a
/// cool-down and re-enters processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceState {
    /// Awaiting processing.
    Pending,
    /// A claim was produced (or the source was linked to an existing claim).
    Processed,
    /// No factual claim: opinion, ad, empty, or duplicate content.
    Skipped,
    /// Processing failed; terminal after three attempts.
    Failed,
}

impl SourceState {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Why a source was skipped without producing a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Pure opinion with no factual content.
    Opinion,
    /// Insult or abuse.
    Insult,
    /// Advertisement or promotion.
    Advertisement,
    /// Non-factual exhortation ("go vote!").
    Exhortation,
    /// Empty or too ambiguous to extract a claim.
    EmptyOrAmbiguous,
    /// Near-identical to an already-verified claim.
    Duplicate,
}

impl SkipReason {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opinion => "opinion",
            Self::Insult => "insult",
            Self::Advertisement => "advertisement",
            Self::Exhortation => "exhortation",
            Self::EmptyOrAmbiguous => "empty_or_ambiguous",
            Self::Duplicate => "duplicate",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "opinion" => Some(Self::Opinion),
            "insult" => Some(Self::Insult),
            "advertisement" => Some(Self::Advertisement),
            "exhortation" => Some(Self::Exhortation),
            "empty_or_ambiguous" => Some(Self::EmptyOrAmbiguous),
            "duplicate" => Some(Self::Duplicate),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Verdicts and review
// ---------------------------------------------------------------------------

/// The fact-check verdict for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Evidence supports the claim.
    Verified,
    /// Evidence refutes the claim.
    Debunked,
    /// Factually present but contextually manipulated.
    Misleading,
    /// Insufficient or conflicting evidence.
    Unverified,
}

impl Verdict {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Debunked => "debunked",
            Self::Misleading => "misleading",
            Self::Unverified => "unverified",
        }
    }

    /// Parse a verdict string. Tolerates the capitalized forms LLMs
    /// produce, but rejects anything outside the closed vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "verified" => Some(Self::Verified),
            "debunked" => Some(Self::Debunked),
            "misleading" => Some(Self::Misleading),
            "unverified" => Some(Self::Unverified),
            _ => None,
        }
    }
}

/// How strongly the gathered evidence backs the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvidenceStrength {
    /// Broad agreement among sub-agents with high confidence.
    Strong,
    /// Majority agreement with moderate confidence.
    Moderate,
    /// Evidence was obtained but is thin or conflicting.
    Weak,
    /// No usable evidence was obtained.
    Insufficient,
}

impl EvidenceStrength {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
            Self::Insufficient => "insufficient",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strong" => Some(Self::Strong),
            "moderate" => Some(Self::Moderate),
            "weak" => Some(Self::Weak),
            "insufficient" => Some(Self::Insufficient),
            _ => None,
        }
    }
}

/// Priority for the human review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewPriority {
    /// Confidence below 0.4 -- review first.
    High,
    /// Confidence below 0.6.
    Medium,
    /// Flagged for other reasons.
    Low,
    /// Not in the review queue.
    None,
}

impl ReviewPriority {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Derive review flags from a synthesized confidence score.
    ///
    /// Confidence below 0.6 needs review; below 0.4 the priority is high.
    /// Returns `(needs_review, priority)`.
    pub fn from_confidence(confidence: f64) -> (bool, Self) {
        if confidence < 0.4 {
            (true, Self::High)
        } else if confidence < 0.6 {
            (true, Self::Medium)
        } else {
            (false, Self::None)
        }
    }
}

// ---------------------------------------------------------------------------
// Entities and credibility
// ---------------------------------------------------------------------------

/// Kind of a canonicalized named entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A natural person (politician, official, journalist).
    Person,
    /// A public institution (ministry, central bank, court).
    Institution,
    /// A geographic location.
    Location,
    /// A private or civil organization (party, company, NGO).
    Organization,
}

impl EntityKind {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Institution => "institution",
            Self::Location => "location",
            Self::Organization => "organization",
        }
    }

    /// Parse an entity kind. Tolerates the capitalized forms LLMs produce.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "institution" => Some(Self::Institution),
            "location" => Some(Self::Location),
            "organization" | "organisation" => Some(Self::Organization),
            _ => None,
        }
    }
}

/// Credibility tier of an evidence domain, 1 (official) through 4 (unknown).
///
/// The tier biases evidence ordering and sub-agent weighting. It never
/// filters a source out; only the domain blacklist drops sources entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CredibilityTier {
    /// Official sources: government, central bank, statistics institute.
    Official,
    /// Vetted national press.
    VettedPress,
    /// Other press outlets.
    OtherPress,
    /// Unknown or unclassified domains.
    Unknown,
}

impl CredibilityTier {
    /// Numeric rank stored in the database (1 = most credible).
    pub const fn rank(self) -> i16 {
        match self {
            Self::Official => 1,
            Self::VettedPress => 2,
            Self::OtherPress => 3,
            Self::Unknown => 4,
        }
    }

    /// Build a tier from its numeric rank. Returns `None` outside 1..=4.
    pub const fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            1 => Some(Self::Official),
            2 => Some(Self::VettedPress),
            3 => Some(Self::OtherPress),
            4 => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Evidence weight used by the source-credibility sub-agent.
    pub const fn weight(self) -> f64 {
        match self {
            Self::Official => 1.0,
            Self::VettedPress => 0.8,
            Self::OtherPress => 0.5,
            Self::Unknown => 0.25,
        }
    }
}

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// Lifecycle state of a prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Accepting trades.
    Open,
    /// Outcome determined, no further trades.
    Resolved,
    /// Cancelled before resolution.
    Cancelled,
}

impl MarketStatus {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "resolved" => Some(Self::Resolved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Which side of a binary market a trade takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// Betting the question resolves yes.
    Yes,
    /// Betting the question resolves no.
    No,
}

impl TradeSide {
    /// Stable string form used in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task bus
// ---------------------------------------------------------------------------

/// Every kind of task that can travel over the task bus.
///
/// The scheduler produces the periodic kinds; the pipeline produces
/// `ProcessSource` (one per scraped source) and `WriteEmbedding` (one per
/// persisted claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Run all enabled scrapers for one tick.
    ScrapeSources,
    /// Extract, verify, and persist a single source.
    ProcessSource,
    /// Compute and store the embedding for a persisted claim.
    WriteEmbedding,
    /// Recompute trending topics over the rolling window.
    DetectTrendingTopics,
    /// Lightweight sentiment/news refresh for open markets.
    Tier1MarketUpdate,
    /// Deep multi-signal reassessment of open markets.
    Tier2MarketAnalysis,
    /// Seed fresh markets that have no trades yet.
    SeedNewMarkets,
    /// Reassess open markets with stale agent assessments.
    ReassessInactiveMarkets,
    /// Top up user credit accounts on the first of the month.
    MonthlyCreditTopup,
    /// Roll up moving-window statistics.
    StatsRollup,
}

impl TaskKind {
    /// Stable task name used on the bus and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScrapeSources => "scrape_sources",
            Self::ProcessSource => "process_source",
            Self::WriteEmbedding => "write_embedding",
            Self::DetectTrendingTopics => "detect_trending_topics",
            Self::Tier1MarketUpdate => "tier1_market_update",
            Self::Tier2MarketAnalysis => "tier2_market_analysis",
            Self::SeedNewMarkets => "seed_new_markets",
            Self::ReassessInactiveMarkets => "reassess_inactive_markets",
            Self::MonthlyCreditTopup => "monthly_credit_topup",
            Self::StatsRollup => "stats_rollup",
        }
    }

    /// Parse a task name from the bus. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scrape_sources" => Some(Self::ScrapeSources),
            "process_source" => Some(Self::ProcessSource),
            "write_embedding" => Some(Self::WriteEmbedding),
            "detect_trending_topics" => Some(Self::DetectTrendingTopics),
            "tier1_market_update" => Some(Self::Tier1MarketUpdate),
            "tier2_market_analysis" => Some(Self::Tier2MarketAnalysis),
            "seed_new_markets" => Some(Self::SeedNewMarkets),
            "reassess_inactive_markets" => Some(Self::ReassessInactiveMarkets),
            "monthly_credit_topup" => Some(Self::MonthlyCreditTopup),
            "stats_rollup" => Some(Self::StatsRollup),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parse_tolerates_case() {
        assert_eq!(Verdict::parse("Verified"), Some(Verdict::Verified));
        assert_eq!(Verdict::parse("DEBUNKED"), Some(Verdict::Debunked));
        assert_eq!(Verdict::parse("misleading"), Some(Verdict::Misleading));
    }

    #[test]
    fn verdict_parse_rejects_unknown() {
        assert_eq!(Verdict::parse("true"), None);
        assert_eq!(Verdict::parse("false"), None);
        assert_eq!(Verdict::parse(""), None);
    }

    #[test]
    fn review_thresholds() {
        assert_eq!(ReviewPriority::from_confidence(0.39), (true, ReviewPriority::High));
        assert_eq!(ReviewPriority::from_confidence(0.40), (true, ReviewPriority::Medium));
        assert_eq!(ReviewPriority::from_confidence(0.59), (true, ReviewPriority::Medium));
        assert_eq!(ReviewPriority::from_confidence(0.60), (false, ReviewPriority::None));
        assert_eq!(ReviewPriority::from_confidence(0.95), (false, ReviewPriority::None));
    }

    #[test]
    fn credibility_tier_rank_roundtrip() {
        for tier in [
            CredibilityTier::Official,
            CredibilityTier::VettedPress,
            CredibilityTier::OtherPress,
            CredibilityTier::Unknown,
        ] {
            assert_eq!(CredibilityTier::from_rank(tier.rank()), Some(tier));
        }
        assert_eq!(CredibilityTier::from_rank(0), None);
        assert_eq!(CredibilityTier::from_rank(5), None);
    }

    #[test]
    fn task_kind_str_roundtrip() {
        for kind in [
            TaskKind::ScrapeSources,
            TaskKind::ProcessSource,
            TaskKind::WriteEmbedding,
            TaskKind::DetectTrendingTopics,
            TaskKind::Tier1MarketUpdate,
            TaskKind::Tier2MarketAnalysis,
            TaskKind::SeedNewMarkets,
            TaskKind::ReassessInactiveMarkets,
            TaskKind::MonthlyCreditTopup,
            TaskKind::StatsRollup,
        ] {
            assert_eq!(TaskKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn state_strings_roundtrip() {
        for state in [
            SourceState::Pending,
            SourceState::Processed,
            SourceState::Skipped,
            SourceState::Failed,
        ] {
            assert_eq!(SourceState::parse(state.as_str()), Some(state));
        }
    }
}
