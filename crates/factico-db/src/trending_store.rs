//! Store operations for trending topic snapshots and source credibility.
//!
//! Trending topics are snapshots: each detector run replaces the whole set
//! atomically so readers never see a half-replaced mix of two runs.

use chrono::{DateTime, Utc};
use factico_types::{Platform, SourceCredibility, TrendId, TrendingTopic};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on `trending_topics` and `source_credibility`.
pub struct TrendingStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TrendingStore<'a> {
    /// Create a trending store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace the trending snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure; the prior snapshot
    /// survives intact.
    pub async fn replace_snapshot(&self, topics: &[TrendingTopic]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM trending_topics")
            .execute(&mut *tx)
            .await?;

        for topic in topics {
            sqlx::query(
                r"INSERT INTO trending_topics
                      (id, name, keywords, trend_score, velocity, correlation,
                       relevance, misinformation_risk, priority, detected_at)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(topic.id.into_inner())
            .bind(&topic.name)
            .bind(&topic.keywords)
            .bind(topic.trend_score)
            .bind(topic.velocity)
            .bind(topic.correlation)
            .bind(topic.relevance)
            .bind(topic.misinformation_risk)
            .bind(topic.priority)
            .bind(topic.detected_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(count = topics.len(), "Replaced trending snapshot");
        Ok(())
    }

    /// The latest snapshot, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest(&self, limit: i64) -> Result<Vec<TrendingTopic>, DbError> {
        let rows: Vec<(
            Uuid,
            String,
            Vec<String>,
            f64,
            f64,
            f64,
            f64,
            f64,
            f64,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r"SELECT id, name, keywords, trend_score, velocity, correlation,
                     relevance, misinformation_risk, priority, detected_at
              FROM trending_topics
              ORDER BY priority DESC
              LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    name,
                    keywords,
                    trend_score,
                    velocity,
                    correlation,
                    relevance,
                    misinformation_risk,
                    priority,
                    detected_at,
                )| TrendingTopic {
                    id: TrendId::from(id),
                    name,
                    keywords,
                    trend_score,
                    velocity,
                    correlation,
                    relevance,
                    misinformation_risk,
                    priority,
                    detected_at,
                },
            )
            .collect())
    }

    /// Upsert per-author credibility aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure.
    pub async fn upsert_credibility(&self, rows: &[SourceCredibility]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r"INSERT INTO source_credibility
                      (platform, author, total_claims, verified, debunked,
                       misleading, unverified, score, computed_at)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                  ON CONFLICT (platform, author) DO UPDATE SET
                      total_claims = EXCLUDED.total_claims,
                      verified = EXCLUDED.verified,
                      debunked = EXCLUDED.debunked,
                      misleading = EXCLUDED.misleading,
                      unverified = EXCLUDED.unverified,
                      score = EXCLUDED.score,
                      computed_at = EXCLUDED.computed_at",
            )
            .bind(row.platform.as_str())
            .bind(&row.author)
            .bind(row.total_claims)
            .bind(row.verified)
            .bind(row.debunked)
            .bind(row.misleading)
            .bind(row.unverified)
            .bind(row.score)
            .bind(row.computed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Raw verdict counts per author over processed sources, the input to
    /// the credibility aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn author_verdict_counts(&self) -> Result<Vec<SourceCredibility>, DbError> {
        let rows: Vec<(String, String, i64, i64, i64, i64, i64)> = sqlx::query_as(
            r"SELECT s.platform, s.author,
                     count(c.id),
                     count(c.id) FILTER (WHERE c.verdict = 'verified'),
                     count(c.id) FILTER (WHERE c.verdict = 'debunked'),
                     count(c.id) FILTER (WHERE c.verdict = 'misleading'),
                     count(c.id) FILTER (WHERE c.verdict = 'unverified')
              FROM sources s
              JOIN claims c ON c.id = s.claim_id
              GROUP BY s.platform, s.author",
        )
        .fetch_all(self.pool)
        .await?;

        let now = Utc::now();
        rows.into_iter()
            .map(
                |(platform, author, total, verified, debunked, misleading, unverified)| {
                    let platform = Platform::parse(&platform)
                        .ok_or_else(|| DbError::Decode(format!("unknown platform: {platform}")))?;
                    Ok(SourceCredibility {
                        platform,
                        author,
                        total_claims: total,
                        verified,
                        debunked,
                        misleading,
                        unverified,
                        score: credibility_score(total, verified, debunked, misleading),
                        computed_at: now,
                    })
                },
            )
            .collect()
    }
}

/// Credibility score: verified share, with debunked and misleading claims
/// penalized at full and half weight respectively.
fn credibility_score(total: i64, verified: i64, debunked: i64, misleading: i64) -> f64 {
    if total <= 0 {
        return 0.5;
    }
    #[allow(clippy::cast_precision_loss)]
    let (t, v, d, m) = (
        total as f64,
        verified as f64,
        debunked as f64,
        misleading as f64,
    );
    ((v - d - 0.5 * m) / t).mul_add(0.5, 0.5).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credibility_score_bounds() {
        // All verified tends to 1, all debunked tends to 0.
        assert!((credibility_score(10, 10, 0, 0) - 1.0).abs() < 1e-9);
        assert!(credibility_score(10, 0, 10, 0).abs() < 1e-9);
        // No data is the neutral prior.
        assert!((credibility_score(0, 0, 0, 0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn misleading_penalized_half() {
        let half = credibility_score(10, 0, 0, 10);
        let full = credibility_score(10, 0, 10, 0);
        assert!(half > full);
    }
}
