//! Topic taxonomy and entity lookups.
//!
//! The topic taxonomy is fixed and loaded at startup; the classifier only
//! ever links claims to existing topics. Entities are canonicalized on
//! insert by the claim store; this module provides the read side.

use factico_types::{Entity, EntityId, EntityKind, Topic, TopicId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on `topics`, `entities`, and their link tables.
pub struct TaxonomyStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxonomyStore<'a> {
    /// Create a taxonomy store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Seed the fixed taxonomy. Idempotent; existing slugs are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure.
    pub async fn seed_topics(&self, topics: &[(String, String)]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for (name, slug) in topics {
            sqlx::query(
                r"INSERT INTO topics (id, name, taxonomy_slug)
                  VALUES ($1, $2, $3)
                  ON CONFLICT (taxonomy_slug) DO NOTHING",
            )
            .bind(Uuid::now_v7())
            .bind(name)
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Load the full taxonomy.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn all_topics(&self) -> Result<Vec<Topic>, DbError> {
        let rows: Vec<(Uuid, String, String)> =
            sqlx::query_as("SELECT id, name, taxonomy_slug FROM topics ORDER BY taxonomy_slug")
                .fetch_all(self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, taxonomy_slug)| Topic {
                id: TopicId::from(id),
                name,
                taxonomy_slug,
            })
            .collect())
    }

    /// Entities linked to a claim.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn entities_for_claim(
        &self,
        claim_id: factico_types::ClaimId,
    ) -> Result<Vec<Entity>, DbError> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            r"SELECT e.id, e.canonical_name, e.kind
              FROM entities e
              JOIN claim_entities ce ON ce.entity_id = e.id
              WHERE ce.claim_id = $1
              ORDER BY e.canonical_name",
        )
        .bind(claim_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, canonical_name, kind)| {
                let kind = EntityKind::parse(&kind)
                    .ok_or_else(|| DbError::Decode(format!("unknown entity kind: {kind}")))?;
                Ok(Entity {
                    id: EntityId::from(id),
                    canonical_name,
                    kind,
                })
            })
            .collect()
    }
}
