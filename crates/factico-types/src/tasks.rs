//! Task bus message types and retry policies.
//!
//! The bus carries `{name, payload-as-JSON, attempt, enqueue_at,
//! available_at, unique_key?}`. Payloads are closed structs serialized to
//! JSON; handlers deserialize the payload for their kind and must be
//! idempotent keyed on the payload's primary id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::enums::TaskKind;
use crate::ids::{ClaimId, SourceId, TaskId};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload for [`TaskKind::ProcessSource`]: one task per scraped source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSourcePayload {
    /// The source to extract, verify, and persist.
    pub source_id: SourceId,
}

/// Payload for [`TaskKind::WriteEmbedding`]: one task per persisted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEmbeddingPayload {
    /// The claim whose embedding should be computed and stored.
    pub claim_id: ClaimId,
}

// ---------------------------------------------------------------------------
// Bus message
// ---------------------------------------------------------------------------

/// A task as seen by a worker after dequeue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Bus-assigned identifier.
    pub id: TaskId,
    /// Task kind.
    pub kind: TaskKind,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
    /// 1-based attempt counter (1 on first delivery).
    pub attempt: i32,
    /// When the task was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// When the task became (or becomes) available for dequeue.
    pub available_at: DateTime<Utc>,
    /// Deduplication key: while an unfinished task with this key exists,
    /// enqueues with the same key are no-ops.
    pub unique_key: Option<String>,
    /// Higher dequeues first within the available set.
    pub priority: i16,
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Retry policy applied when a task is nacked.
///
/// Backoff for attempt `n` (1-based) is
/// `min(initial_backoff * multiplier^(n-1), max_backoff)` plus up to
/// `jitter` of uniform random delay. On exhaustion the task moves to the
/// dead-letter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delivery attempts before dead-lettering.
    pub max_attempts: i32,
    /// Backoff after the first failure.
    pub initial_backoff: Duration,
    /// Exponential multiplier per subsequent failure.
    pub multiplier: u32,
    /// Upper bound on the uniform random jitter added to each backoff.
    pub jitter: Duration,
    /// Ceiling on the computed backoff.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// The policy for a task kind.
    ///
    /// LLM-heavy kinds get few attempts with long backoff (provider
    /// rate-limit friendly); cheap periodic kinds get a single retry since
    /// the next scheduled tick supersedes them anyway.
    pub const fn for_kind(kind: TaskKind) -> Self {
        match kind {
            TaskKind::ProcessSource => Self {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(60),
                multiplier: 4,
                jitter: Duration::from_secs(30),
                max_backoff: Duration::from_secs(1800),
            },
            TaskKind::WriteEmbedding => Self {
                max_attempts: 5,
                initial_backoff: Duration::from_secs(30),
                multiplier: 3,
                jitter: Duration::from_secs(15),
                max_backoff: Duration::from_secs(3600),
            },
            TaskKind::ScrapeSources
            | TaskKind::DetectTrendingTopics
            | TaskKind::Tier1MarketUpdate
            | TaskKind::SeedNewMarkets
            | TaskKind::ReassessInactiveMarkets
            | TaskKind::StatsRollup => Self {
                max_attempts: 2,
                initial_backoff: Duration::from_secs(120),
                multiplier: 2,
                jitter: Duration::from_secs(30),
                max_backoff: Duration::from_secs(600),
            },
            TaskKind::Tier2MarketAnalysis | TaskKind::MonthlyCreditTopup => Self {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(300),
                multiplier: 2,
                jitter: Duration::from_secs(60),
                max_backoff: Duration::from_secs(3600),
            },
        }
    }

    /// Compute the backoff before the next delivery after `attempt`
    /// failures (1-based), without jitter. Jitter is added by the bus so
    /// the policy itself stays deterministic and testable.
    pub fn backoff_for_attempt(&self, attempt: i32) -> Duration {
        let exponent = attempt.saturating_sub(1).max(0).unsigned_abs();
        let factor = self.multiplier.saturating_pow(exponent.min(16));
        let raw = self.initial_backoff.saturating_mul(factor);
        raw.min(self.max_backoff)
    }

    /// Whether a task that has failed `attempt` times should be retried.
    pub const fn should_retry(&self, attempt: i32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip_preserves_bytes() {
        let payload = ProcessSourcePayload {
            source_id: SourceId::new(),
        };
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let back = serde_json::from_slice::<ProcessSourcePayload>(&bytes).ok();
        assert_eq!(back, Some(payload));
        // Re-serializing yields identical bytes (stable field order).
        let bytes_again = serde_json::to_vec(&payload).unwrap_or_default();
        assert_eq!(bytes, bytes_again);
    }

    #[test]
    fn backoff_grows_exponentially_to_cap() {
        let policy = RetryPolicy::for_kind(TaskKind::ProcessSource);
        let first = policy.backoff_for_attempt(1);
        let second = policy.backoff_for_attempt(2);
        assert_eq!(first, Duration::from_secs(60));
        assert_eq!(second, Duration::from_secs(240));
        // Far attempts clamp at max_backoff.
        assert_eq!(policy.backoff_for_attempt(10), Duration::from_secs(1800));
    }

    #[test]
    fn process_source_dead_letters_after_three() {
        let policy = RetryPolicy::for_kind(TaskKind::ProcessSource);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
