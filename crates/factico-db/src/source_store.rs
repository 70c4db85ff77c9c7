//! Store operations for scraped sources.
//!
//! Sources move monotonically from `pending` to a terminal state. The task
//! bus owns dispatch; this store owns the state transitions and enforces
//! that a terminal source is never silently reopened (the retry path is
//! explicit and bounded).

use chrono::{DateTime, Duration, Utc};
use factico_types::{Engagement, Platform, SkipReason, Source, SourceId, SourceState};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Failed sources younger than this are not yet eligible for retry.
const RETRY_COOLDOWN_MINUTES: i64 = 15;

/// Attempts after which a source is terminally failed.
const MAX_SOURCE_ATTEMPTS: i16 = 3;

/// Operations on the `sources` table.
pub struct SourceStore<'a> {
    pool: &'a PgPool,
}

/// A row from the `sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    /// Source id.
    pub id: Uuid,
    /// Platform string.
    pub platform: String,
    /// Platform-native id.
    pub external_id: String,
    /// Author handle or outlet.
    pub author: String,
    /// Canonical URL.
    pub url: String,
    /// Normalized content.
    pub content: String,
    /// Ingestion time.
    pub captured_at: DateTime<Utc>,
    /// Platform-reported publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Likes, when supplied.
    pub likes: Option<i64>,
    /// Shares, when supplied.
    pub shares: Option<i64>,
    /// Comments, when supplied.
    pub comments: Option<i64>,
    /// Views, when supplied.
    pub views: Option<i64>,
    /// Lifecycle state string.
    pub state: String,
    /// Processing attempts.
    pub attempts: i16,
    /// Skip/failure reason code.
    pub state_reason: Option<String>,
    /// Linked claim, once processed.
    pub claim_id: Option<Uuid>,
}

impl SourceRow {
    /// Convert the raw row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if a stored enum string is unknown.
    pub fn into_source(self) -> Result<Source, DbError> {
        let platform = Platform::parse(&self.platform)
            .ok_or_else(|| DbError::Decode(format!("unknown platform: {}", self.platform)))?;
        let state = SourceState::parse(&self.state)
            .ok_or_else(|| DbError::Decode(format!("unknown source state: {}", self.state)))?;
        Ok(Source {
            id: SourceId::from(self.id),
            platform,
            external_id: self.external_id,
            author: self.author,
            url: self.url,
            content: self.content,
            captured_at: self.captured_at,
            published_at: self.published_at,
            engagement: Engagement {
                likes: self.likes,
                shares: self.shares,
                comments: self.comments,
                views: self.views,
            },
            state,
            attempts: self.attempts,
            state_reason: self.state_reason,
        })
    }
}

/// Columns selected for every full source read.
const SOURCE_COLUMNS: &str = "id, platform, external_id, author, url, content, captured_at, \
     published_at, likes, shares, comments, views, state, attempts, state_reason, claim_id";

impl<'a> SourceStore<'a> {
    /// Create a new source store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of freshly scraped sources in one transaction.
    ///
    /// Duplicates (same platform + `external_id`) are discarded at insert.
    /// Returns the ids of the rows actually inserted, so the caller can
    /// enqueue exactly one `process_source` task per new source.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_batch(&self, sources: &[Source]) -> Result<Vec<SourceId>, DbError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(sources.len());

        for source in sources {
            let row: Option<(Uuid,)> = sqlx::query_as(
                r"INSERT INTO sources
                      (id, platform, external_id, author, url, content, captured_at,
                       published_at, likes, shares, comments, views, state, attempts)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', 0)
                  ON CONFLICT (platform, external_id) DO NOTHING
                  RETURNING id",
            )
            .bind(source.id.into_inner())
            .bind(source.platform.as_str())
            .bind(&source.external_id)
            .bind(&source.author)
            .bind(&source.url)
            .bind(&source.content)
            .bind(source.captured_at)
            .bind(source.published_at)
            .bind(source.engagement.likes)
            .bind(source.engagement.shares)
            .bind(source.engagement.comments)
            .bind(source.engagement.views)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((id,)) = row {
                inserted.push(SourceId::from(id));
            }
        }

        tx.commit().await?;
        tracing::debug!(
            batch = sources.len(),
            inserted = inserted.len(),
            "Inserted scraped sources"
        );
        Ok(inserted)
    }

    /// Fetch a source by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Decode`] on a corrupt row.
    pub async fn get(&self, id: SourceId) -> Result<Option<Source>, DbError> {
        let query = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1");
        let row: Option<SourceRow> = sqlx::query_as(&query)
            .bind(id.into_inner())
            .fetch_optional(self.pool)
            .await?;
        row.map(SourceRow::into_source).transpose()
    }

    /// Mark a source skipped with a reason. Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn mark_skipped(&self, id: SourceId, reason: SkipReason) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE sources SET state = 'skipped', state_reason = $2
              WHERE id = $1 AND state IN ('pending', 'failed')",
        )
        .bind(id.into_inner())
        .bind(reason.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a processing failure.
    ///
    /// Increments the attempt counter; the source stays retryable until it
    /// reaches three attempts, after which `failed` is terminal. Returns
    /// the new attempt count. A source that already reached `processed` or
    /// `skipped` is never demoted (a task can be cancelled at its deadline
    /// after the persist transaction committed).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the source does not exist or is
    /// already in a processed/skipped terminal state.
    pub async fn mark_failed(&self, id: SourceId, reason: &str) -> Result<i16, DbError> {
        let row: Option<(i16,)> = sqlx::query_as(
            r"UPDATE sources
              SET state = 'failed', state_reason = $2,
                  attempts = attempts + 1, last_failed_at = now()
              WHERE id = $1 AND state IN ('pending', 'failed')
              RETURNING attempts",
        )
        .bind(id.into_inner())
        .bind(reason)
        .fetch_optional(self.pool)
        .await?;
        row.map(|(attempts,)| attempts)
            .ok_or_else(|| DbError::NotFound(format!("source {id}")))
    }

    /// Reopen failed sources eligible for an automatic retry.
    ///
    /// Eligible means fewer than three attempts and the last failure at
    /// least fifteen minutes old. Returns the reopened ids so the caller
    /// can enqueue `process_source` tasks for them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn reopen_failed(&self, limit: i64) -> Result<Vec<SourceId>, DbError> {
        let cutoff = Utc::now() - Duration::minutes(RETRY_COOLDOWN_MINUTES);
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r"UPDATE sources SET state = 'pending'
              WHERE id IN (
                  SELECT id FROM sources
                  WHERE state = 'failed' AND attempts < $1 AND last_failed_at <= $2
                  ORDER BY last_failed_at
                  LIMIT $3
                  FOR UPDATE SKIP LOCKED
              )
              RETURNING id",
        )
        .bind(i64::from(MAX_SOURCE_ATTEMPTS))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| SourceId::from(id)).collect())
    }

    /// Lightweight rows for trend detection over a rolling window.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn window_for_trending(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrendSourceRow>, DbError> {
        let rows: Vec<TrendSourceRow> = sqlx::query_as(
            r"SELECT s.id, s.platform, s.content, s.captured_at, s.claim_id, c.verdict
              FROM sources s
              LEFT JOIN claims c ON c.id = s.claim_id
              WHERE s.captured_at >= $1
              ORDER BY s.captured_at",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// A joined source/verdict row consumed by the trending detector.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendSourceRow {
    /// Source id.
    pub id: Uuid,
    /// Platform string.
    pub platform: String,
    /// Normalized content.
    pub content: String,
    /// Ingestion time.
    pub captured_at: DateTime<Utc>,
    /// Linked claim, when processed.
    pub claim_id: Option<Uuid>,
    /// Verdict of the linked claim, when any.
    pub verdict: Option<String>,
}
