//! LLM cost tracking.
//!
//! Provides a thread-safe [`CostTracker`] that records token usage per LLM
//! call and computes estimated costs using configurable per-million-token
//! rates. Costs are tracked separately for the primary and fallback
//! providers.
//!
//! All monetary calculations use [`rust_decimal::Decimal`] for financial
//! precision -- no floating-point arithmetic.

use std::sync::Mutex;

use rust_decimal::Decimal;

/// One million, the denominator for per-million-token pricing.
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Thread-safe LLM cost tracker.
///
/// Holds per-million-token pricing for two provider tiers (primary and
/// fallback) and accumulates token counts and estimated costs across all
/// recorded calls. Safe to share via `Arc<CostTracker>`.
pub struct CostTracker {
    /// Price per million input tokens for the primary provider.
    primary_input_rate: Decimal,
    /// Price per million output tokens for the primary provider.
    primary_output_rate: Decimal,
    /// Price per million input tokens for the fallback provider.
    fallback_input_rate: Decimal,
    /// Price per million output tokens for the fallback provider.
    fallback_output_rate: Decimal,
    /// Mutable interior state protected by a mutex.
    inner: Mutex<CostTrackerInner>,
}

/// Mutable accumulation state held inside the mutex.
#[derive(Debug, Default)]
struct CostTrackerInner {
    total_calls: u64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    total_estimated_cost: Decimal,
    primary_calls: u64,
    fallback_calls: u64,
}

/// Snapshot of cost tracking state returned by [`CostTracker::summary`].
#[derive(Debug, Clone)]
pub struct CostSummary {
    /// Total number of LLM calls recorded.
    pub total_calls: u64,
    /// Total input tokens across all calls.
    pub total_input_tokens: u64,
    /// Total output tokens across all calls.
    pub total_output_tokens: u64,
    /// Running estimated cost in dollars.
    pub total_estimated_cost: Decimal,
    /// Number of calls routed to the primary provider.
    pub primary_calls: u64,
    /// Number of calls routed to the fallback provider.
    pub fallback_calls: u64,
}

impl CostTracker {
    /// Create a new cost tracker with per-million-token pricing.
    ///
    /// Rates are in dollars per million tokens. For example,
    /// `Decimal::new(30, 2)` represents $0.30 per million tokens.
    pub const fn new(
        primary_input_rate: Decimal,
        primary_output_rate: Decimal,
        fallback_input_rate: Decimal,
        fallback_output_rate: Decimal,
    ) -> Self {
        Self {
            primary_input_rate,
            primary_output_rate,
            fallback_input_rate,
            fallback_output_rate,
            inner: Mutex::new(CostTrackerInner {
                total_calls: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_estimated_cost: Decimal::ZERO,
                primary_calls: 0,
                fallback_calls: 0,
            }),
        }
    }

    /// A tracker with all rates zero, for tests and cost-free deployments.
    pub const fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }

    /// Record a completed LLM call with token usage.
    ///
    /// `tier` is `"primary"` or `"fallback"`; anything else is counted as
    /// primary (rates are conservative).
    pub fn record_call(&self, tier: &str, input_tokens: u64, output_tokens: u64) {
        let is_fallback = tier == "fallback";
        let (input_rate, output_rate) = if is_fallback {
            (self.fallback_input_rate, self.fallback_output_rate)
        } else {
            (self.primary_input_rate, self.primary_output_rate)
        };

        let input_cost = Decimal::from(input_tokens)
            .checked_mul(input_rate)
            .and_then(|c| c.checked_div(ONE_MILLION))
            .unwrap_or(Decimal::ZERO);
        let output_cost = Decimal::from(output_tokens)
            .checked_mul(output_rate)
            .and_then(|c| c.checked_div(ONE_MILLION))
            .unwrap_or(Decimal::ZERO);
        let call_cost = input_cost
            .checked_add(output_cost)
            .unwrap_or(Decimal::ZERO);

        if let Ok(mut inner) = self.inner.lock() {
            inner.total_calls = inner.total_calls.saturating_add(1);
            inner.total_input_tokens = inner.total_input_tokens.saturating_add(input_tokens);
            inner.total_output_tokens = inner.total_output_tokens.saturating_add(output_tokens);
            inner.total_estimated_cost = inner
                .total_estimated_cost
                .checked_add(call_cost)
                .unwrap_or(inner.total_estimated_cost);
            if is_fallback {
                inner.fallback_calls = inner.fallback_calls.saturating_add(1);
            } else {
                inner.primary_calls = inner.primary_calls.saturating_add(1);
            }
        }
    }

    /// Snapshot the current accumulation state.
    pub fn summary(&self) -> CostSummary {
        self.inner.lock().map_or(
            CostSummary {
                total_calls: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_estimated_cost: Decimal::ZERO,
                primary_calls: 0,
                fallback_calls: 0,
            },
            |inner| CostSummary {
                total_calls: inner.total_calls,
                total_input_tokens: inner.total_input_tokens,
                total_output_tokens: inner.total_output_tokens,
                total_estimated_cost: inner.total_estimated_cost,
                primary_calls: inner.primary_calls,
                fallback_calls: inner.fallback_calls,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_prices_calls() {
        // $0.30 / $0.88 per million (primary), $3.00 / $15.00 (fallback).
        let tracker = CostTracker::new(
            Decimal::new(30, 2),
            Decimal::new(88, 2),
            Decimal::new(300, 2),
            Decimal::new(1500, 2),
        );

        tracker.record_call("primary", 1_000_000, 1_000_000);
        let summary = tracker.summary();
        assert_eq!(summary.total_calls, 1);
        assert_eq!(summary.primary_calls, 1);
        // 0.30 + 0.88 = 1.18 dollars for a million of each.
        assert_eq!(summary.total_estimated_cost, Decimal::new(118, 2));
    }

    #[test]
    fn fallback_priced_separately() {
        let tracker = CostTracker::new(
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::new(300, 2),
            Decimal::ZERO,
        );
        tracker.record_call("fallback", 1_000_000, 0);
        let summary = tracker.summary();
        assert_eq!(summary.fallback_calls, 1);
        assert_eq!(summary.total_estimated_cost, Decimal::new(300, 2));
    }

    #[test]
    fn zero_tracker_accumulates_tokens_only() {
        let tracker = CostTracker::zero();
        tracker.record_call("primary", 500, 100);
        let summary = tracker.summary();
        assert_eq!(summary.total_input_tokens, 500);
        assert_eq!(summary.total_output_tokens, 100);
        assert_eq!(summary.total_estimated_cost, Decimal::ZERO);
    }
}
