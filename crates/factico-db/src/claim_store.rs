//! Store operations for claims, evidence, and their entity/topic links.
//!
//! Persistence of a verdict is one transaction that also advances the
//! source state, so a claim is never visible to readers half-linked. The
//! duplicate path links a source to an existing claim without touching the
//! claim itself.

use chrono::{DateTime, Utc};
use factico_types::{
    Claim, ClaimId, CredibilityTier, EntityKind, Evidence, EvidenceDoc, EvidenceId,
    EvidenceStrength, ReviewPriority, SimilarClaim, SourceId, TopicId, Verdict,
    MAX_EXPLANATION_CHARS,
};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// A claim ready for insertion, before review flags are derived.
#[derive(Debug, Clone)]
pub struct NewClaim {
    /// Normalized claim text.
    pub text: String,
    /// Original source text.
    pub original_text: String,
    /// Synthesized verdict.
    pub verdict: Verdict,
    /// Reader-facing explanation (capped at insert).
    pub explanation: String,
    /// Synthesized confidence.
    pub confidence: f64,
    /// Evidence strength.
    pub evidence_strength: EvidenceStrength,
}

/// A canonicalized entity to link to a claim.
#[derive(Debug, Clone)]
pub struct EntityLink {
    /// Entity kind.
    pub kind: EntityKind,
    /// Canonical name after alias resolution.
    pub canonical_name: String,
}

/// A topic assignment with classifier confidence.
#[derive(Debug, Clone, Copy)]
pub struct TopicLink {
    /// The taxonomy topic.
    pub topic_id: TopicId,
    /// Classifier confidence (already thresholded at 0.5).
    pub confidence: f64,
}

/// A row from the `claims` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    /// Claim id.
    pub id: Uuid,
    /// Normalized text.
    pub text: String,
    /// Original source text.
    pub original_text: String,
    /// Verdict string.
    pub verdict: String,
    /// Explanation.
    pub explanation: String,
    /// Confidence.
    pub confidence: f64,
    /// Evidence strength string.
    pub evidence_strength: String,
    /// Review flag.
    pub needs_review: bool,
    /// Review priority string.
    pub review_priority: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl ClaimRow {
    /// Convert the raw row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if a stored enum string is unknown.
    pub fn into_claim(self) -> Result<Claim, DbError> {
        let verdict = Verdict::parse(&self.verdict)
            .ok_or_else(|| DbError::Decode(format!("unknown verdict: {}", self.verdict)))?;
        let evidence_strength = EvidenceStrength::parse(&self.evidence_strength).ok_or_else(
            || DbError::Decode(format!("unknown strength: {}", self.evidence_strength)),
        )?;
        let review_priority = ReviewPriority::parse(&self.review_priority).ok_or_else(|| {
            DbError::Decode(format!("unknown review priority: {}", self.review_priority))
        })?;
        Ok(Claim {
            id: ClaimId::from(self.id),
            text: self.text,
            original_text: self.original_text,
            verdict,
            explanation: self.explanation,
            confidence: self.confidence,
            evidence_strength,
            needs_review: self.needs_review,
            review_priority,
            created_at: self.created_at,
        })
    }
}

/// Columns selected for every full claim read.
const CLAIM_COLUMNS: &str = "id, text, original_text, verdict, explanation, confidence, \
     evidence_strength, needs_review, review_priority, created_at";

/// Operations on the `claims` table and its satellites.
pub struct ClaimStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ClaimStore<'a> {
    /// Create a new claim store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a synthesized verdict atomically.
    ///
    /// One transaction inserts the claim, its evidence rows, entity and
    /// topic links, and marks the source processed with the claim linked.
    /// Review flags are derived from the confidence thresholds here so no
    /// caller can get them wrong.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure; the transaction rolls
    /// back and the source stays pending for the task retry.
    pub async fn persist_verdict(
        &self,
        source_id: SourceId,
        claim: &NewClaim,
        evidence: &[EvidenceDoc],
        entities: &[EntityLink],
        topics: &[TopicLink],
    ) -> Result<ClaimId, DbError> {
        let claim_id = ClaimId::new();
        let (needs_review, review_priority) = ReviewPriority::from_confidence(claim.confidence);
        let explanation: String = claim
            .explanation
            .chars()
            .take(MAX_EXPLANATION_CHARS)
            .collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO claims
                  (id, text, original_text, verdict, explanation, confidence,
                   evidence_strength, needs_review, review_priority)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(claim_id.into_inner())
        .bind(&claim.text)
        .bind(&claim.original_text)
        .bind(claim.verdict.as_str())
        .bind(&explanation)
        .bind(claim.confidence)
        .bind(claim.evidence_strength.as_str())
        .bind(needs_review)
        .bind(review_priority.as_str())
        .execute(&mut *tx)
        .await?;

        for doc in evidence {
            sqlx::query(
                r"INSERT INTO evidence
                      (id, claim_id, url, domain, title, snippet, fetched_at,
                       relevance, credibility_tier)
                  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(EvidenceId::new().into_inner())
            .bind(claim_id.into_inner())
            .bind(&doc.url)
            .bind(&doc.domain)
            .bind(&doc.title)
            .bind(&doc.text)
            .bind(doc.fetched_at)
            .bind(doc.relevance)
            .bind(doc.tier.rank())
            .execute(&mut *tx)
            .await?;
        }

        for entity in entities {
            let (entity_id,): (Uuid,) = sqlx::query_as(
                r"INSERT INTO entities (id, canonical_name, kind)
                  VALUES ($1, $2, $3)
                  ON CONFLICT (canonical_name, kind)
                      DO UPDATE SET canonical_name = EXCLUDED.canonical_name
                  RETURNING id",
            )
            .bind(Uuid::now_v7())
            .bind(&entity.canonical_name)
            .bind(entity.kind.as_str())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r"INSERT INTO claim_entities (claim_id, entity_id)
                  VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(claim_id.into_inner())
            .bind(entity_id)
            .execute(&mut *tx)
            .await?;
        }

        for topic in topics {
            sqlx::query(
                r"INSERT INTO claim_topics (claim_id, topic_id, confidence)
                  VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(claim_id.into_inner())
            .bind(topic.topic_id.into_inner())
            .bind(topic.confidence)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"UPDATE sources SET state = 'processed', claim_id = $2
              WHERE id = $1",
        )
        .bind(source_id.into_inner())
        .bind(claim_id.into_inner())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            claim_id = %claim_id,
            source_id = %source_id,
            verdict = claim.verdict.as_str(),
            confidence = claim.confidence,
            evidence_rows = evidence.len(),
            "Persisted claim"
        );
        Ok(claim_id)
    }

    /// Link a source to an existing claim (the dedup path).
    ///
    /// Marks the source processed without creating a new claim. Safe to
    /// replay; a source already linked stays linked.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn link_duplicate(
        &self,
        source_id: SourceId,
        claim_id: ClaimId,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE sources
              SET state = 'processed', claim_id = $2, state_reason = 'duplicate'
              WHERE id = $1 AND (claim_id IS NULL OR claim_id = $2)",
        )
        .bind(source_id.into_inner())
        .bind(claim_id.into_inner())
        .execute(self.pool)
        .await?;
        tracing::info!(
            source_id = %source_id,
            claim_id = %claim_id,
            "Linked duplicate source to existing claim"
        );
        Ok(())
    }

    /// Fetch a claim by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on query failure or
    /// [`DbError::Decode`] on a corrupt row.
    pub async fn get(&self, id: ClaimId) -> Result<Option<Claim>, DbError> {
        let query = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1");
        let row: Option<ClaimRow> = sqlx::query_as(&query)
            .bind(id.into_inner())
            .fetch_optional(self.pool)
            .await?;
        row.map(ClaimRow::into_claim).transpose()
    }

    /// The claim a source resolved to, when processed.
    ///
    /// Used for idempotent replay of `process_source`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn claim_for_source(&self, source_id: SourceId) -> Result<Option<ClaimId>, DbError> {
        let row: Option<(Option<Uuid>,)> =
            sqlx::query_as("SELECT claim_id FROM sources WHERE id = $1")
                .bind(source_id.into_inner())
                .fetch_optional(self.pool)
                .await?;
        Ok(row.and_then(|(id,)| id).map(ClaimId::from))
    }

    /// Evidence rows for a claim, ordered stably by
    /// `(credibility_tier asc, relevance desc)`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn evidence_for(&self, claim_id: ClaimId) -> Result<Vec<Evidence>, DbError> {
        let rows: Vec<EvidenceRow> = sqlx::query_as(
            r"SELECT id, claim_id, url, domain, title, snippet, fetched_at,
                     relevance, credibility_tier
              FROM evidence
              WHERE claim_id = $1
              ORDER BY credibility_tier ASC, relevance DESC, id",
        )
        .bind(claim_id.into_inner())
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(EvidenceRow::into_evidence).collect()
    }

    /// Newest-first page of claims for the read API.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn recent_page(
        &self,
        skip: i64,
        limit: i64,
        verdict: Option<Verdict>,
    ) -> Result<Vec<Claim>, DbError> {
        let query = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims
             WHERE ($3::text IS NULL OR verdict = $3)
             ORDER BY created_at DESC
             OFFSET $1 LIMIT $2"
        );
        let rows: Vec<ClaimRow> = sqlx::query_as(&query)
            .bind(skip)
            .bind(limit)
            .bind(verdict.map(Verdict::as_str))
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(ClaimRow::into_claim).collect()
    }

    /// Trigram text search over claim texts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn search_text(&self, query_text: &str, limit: i64) -> Result<Vec<Claim>, DbError> {
        let query = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims
             WHERE text % $1 OR text ILIKE '%' || $1 || '%'
             ORDER BY similarity(text, $1) DESC
             LIMIT $2"
        );
        let rows: Vec<ClaimRow> = sqlx::query_as(&query)
            .bind(query_text)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(ClaimRow::into_claim).collect()
    }

    /// Prior claims ranked by embedding cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn similar_by_embedding(
        &self,
        embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<SimilarClaim>, DbError> {
        let vector = Vector::from(unit_norm(embedding));
        let rows: Vec<(Uuid, String, String, f64)> = sqlx::query_as(
            r"SELECT id, text, verdict, 1 - (embedding <=> $1) AS similarity
              FROM claims
              WHERE embedding IS NOT NULL
              ORDER BY embedding <=> $1
              LIMIT $2",
        )
        .bind(vector)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, text, verdict, similarity)| {
                let verdict = Verdict::parse(&verdict)
                    .ok_or_else(|| DbError::Decode(format!("unknown verdict: {verdict}")))?;
                Ok(SimilarClaim {
                    claim_id: ClaimId::from(id),
                    text,
                    verdict,
                    similarity: similarity.clamp(0.0, 1.0),
                })
            })
            .collect()
    }

    /// Prior claims ranked by trigram text similarity.
    ///
    /// The dedup fallback for claims with no embedding written yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn similar_by_text(
        &self,
        text: &str,
        limit: i64,
    ) -> Result<Vec<SimilarClaim>, DbError> {
        let rows: Vec<(Uuid, String, String, f32)> = sqlx::query_as(
            r"SELECT id, text, verdict, similarity(text, $1) AS sim
              FROM claims
              WHERE text % $1
              ORDER BY sim DESC
              LIMIT $2",
        )
        .bind(text)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, claim_text, verdict, sim)| {
                let verdict = Verdict::parse(&verdict)
                    .ok_or_else(|| DbError::Decode(format!("unknown verdict: {verdict}")))?;
                Ok(SimilarClaim {
                    claim_id: ClaimId::from(id),
                    text: claim_text,
                    verdict,
                    similarity: f64::from(sim).clamp(0.0, 1.0),
                })
            })
            .collect()
    }

    /// Write a claim's embedding, normalized to unit length.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn write_embedding(&self, id: ClaimId, embedding: &[f32]) -> Result<(), DbError> {
        let vector = Vector::from(unit_norm(embedding));
        sqlx::query("UPDATE claims SET embedding = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(vector)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Flip the review flags on a claim (the only mutable claim fields).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_review(
        &self,
        id: ClaimId,
        needs_review: bool,
        priority: ReviewPriority,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE claims SET needs_review = $2, review_priority = $3
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(needs_review)
        .bind(priority.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Claims awaiting human review, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn review_queue(&self, limit: i64) -> Result<Vec<Claim>, DbError> {
        let query = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims
             WHERE needs_review
             ORDER BY CASE review_priority
                          WHEN 'high' THEN 0
                          WHEN 'medium' THEN 1
                          WHEN 'low' THEN 2
                          ELSE 3
                      END,
                      created_at DESC
             LIMIT $1"
        );
        let rows: Vec<ClaimRow> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(ClaimRow::into_claim).collect()
    }
}

/// A row from the `evidence` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EvidenceRow {
    id: Uuid,
    claim_id: Uuid,
    url: String,
    domain: String,
    title: String,
    snippet: String,
    fetched_at: DateTime<Utc>,
    relevance: f64,
    credibility_tier: i16,
}

impl EvidenceRow {
    fn into_evidence(self) -> Result<Evidence, DbError> {
        let credibility_tier = CredibilityTier::from_rank(self.credibility_tier)
            .ok_or_else(|| {
                DbError::Decode(format!("credibility tier out of range: {}", self.credibility_tier))
            })?;
        Ok(Evidence {
            id: EvidenceId::from(self.id),
            claim_id: ClaimId::from(self.claim_id),
            url: self.url,
            domain: self.domain,
            title: self.title,
            snippet: self.snippet,
            fetched_at: self.fetched_at,
            relevance: self.relevance,
            credibility_tier,
        })
    }
}

/// Normalize a vector to unit length. Zero vectors pass through unchanged.
fn unit_norm(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_norm_normalizes() {
        let normalized = unit_norm(&[3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unit_norm_zero_vector_unchanged() {
        assert_eq!(unit_norm(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
