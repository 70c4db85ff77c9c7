//! Scheduler coordination: the leader lease and last-fire bookkeeping.
//!
//! Two scheduler instances must never double-fire. Leadership is a lease
//! row with a TTL: a holder renews by re-acquiring before expiry, and a
//! rival can only take over once the lease has lapsed. Last-fire times are
//! durable so restarts coalesce missed ticks into at most one catch-up
//! task per schedule.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on `scheduler_leases` and `schedule_state`.
pub struct SchedulerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SchedulerStore<'a> {
    /// Create a scheduler store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Try to acquire (or renew) the named lease for `holder`.
    ///
    /// Succeeds when the lease is free, expired, or already held by this
    /// holder. Returns whether this holder is now the leader.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbError> {
        let row: Option<(String,)> = sqlx::query_as(
            r"INSERT INTO scheduler_leases (name, holder, expires_at)
              VALUES ($1, $2, now() + make_interval(secs => $3))
              ON CONFLICT (name) DO UPDATE
                  SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
                  WHERE scheduler_leases.expires_at < now()
                     OR scheduler_leases.holder = EXCLUDED.holder
              RETURNING holder",
        )
        .bind(name)
        .bind(holder)
        .bind(ttl.as_secs_f64())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.is_some_and(|(h,)| h == holder))
    }

    /// Release the named lease if held by `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM scheduler_leases WHERE name = $1 AND holder = $2")
            .bind(name)
            .bind(holder)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// The last time a schedule fired, if ever.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn last_fired(&self, schedule: &str) -> Result<Option<DateTime<Utc>>, DbError> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT last_fired_at FROM schedule_state WHERE schedule = $1")
                .bind(schedule)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(|(at,)| at))
    }

    /// Record that a schedule fired at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn record_fired(&self, schedule: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO schedule_state (schedule, last_fired_at)
              VALUES ($1, $2)
              ON CONFLICT (schedule) DO UPDATE SET last_fired_at = EXCLUDED.last_fired_at",
        )
        .bind(schedule)
        .bind(at)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
