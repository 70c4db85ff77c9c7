//! Incrementally maintained statistics counters.
//!
//! Verdict totals are bumped by a database trigger on claim insert (see
//! migration 0005); this store owns the 5-minute rollup of moving-window
//! metrics and the atomic snapshot read the read API consumes.

use chrono::{DateTime, Utc};
use factico_types::StatsSnapshot;
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `stats_counters` singleton.
pub struct StatsStore<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsStore<'a> {
    /// Create a stats store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read the current snapshot in one statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn snapshot(&self) -> Result<StatsSnapshot, DbError> {
        let row: (i64, i64, i64, i64, i64, i64, i64, DateTime<Utc>) = sqlx::query_as(
            r"SELECT total_claims, verified, debunked, misleading, unverified,
                     claims_24h, active_sources_24h, computed_at
              FROM stats_counters WHERE singleton",
        )
        .fetch_one(self.pool)
        .await?;
        let (
            total_claims,
            verified,
            debunked,
            misleading,
            unverified,
            claims_24h,
            active_sources_24h,
            computed_at,
        ) = row;
        Ok(StatsSnapshot {
            total_claims,
            verified,
            debunked,
            misleading,
            unverified,
            claims_24h,
            active_sources_24h,
            computed_at,
        })
    }

    /// Roll up the moving-window metrics (trailing 24 hours).
    ///
    /// Run by the periodic `stats_rollup` task every five minutes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn rollup(&self) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE stats_counters SET
                  claims_24h = (
                      SELECT count(*) FROM claims
                      WHERE created_at >= now() - interval '24 hours'
                  ),
                  active_sources_24h = (
                      SELECT count(*) FROM sources
                      WHERE captured_at >= now() - interval '24 hours'
                  ),
                  computed_at = now()
              WHERE singleton",
        )
        .execute(self.pool)
        .await?;
        tracing::debug!("Stats rollup completed");
        Ok(())
    }
}
