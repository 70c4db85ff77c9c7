//! Store operations for prediction markets, trades, and credit accounts.
//!
//! Bookkeeping is debit-only: a trade subtracts the stake from the
//! actor's balance inside the same transaction that records the
//! append-only trade row and moves the market price, and the balance
//! check constraint rejects overdrafts. The `yes_prob + no_prob = 1`
//! invariant is enforced both here and by a table check constraint.

use chrono::{DateTime, Duration, Utc};
use factico_types::{
    Account, AccountId, ClaimId, FactorId, Market, MarketId, MarketStatus, PredictionFactor,
    TradeId, TradeSide,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// A market ready for insertion.
#[derive(Debug, Clone)]
pub struct NewMarket {
    /// URL-safe slug.
    pub slug: String,
    /// The yes/no question.
    pub question: String,
    /// Category for base-rate statistics.
    pub category: String,
    /// Initial yes probability.
    pub yes_prob: f64,
    /// Linked claim, when seeded from one.
    pub claim_id: Option<ClaimId>,
    /// Close time, when known.
    pub closes_at: Option<DateTime<Utc>>,
}

/// A new agent assessment to append.
#[derive(Debug, Clone)]
pub struct NewFactor {
    /// The market assessed.
    pub market_id: MarketId,
    /// Probability estimate for yes.
    pub assessed_prob: f64,
    /// Agent confidence in the estimate.
    pub confidence: f64,
    /// Free-text reasoning.
    pub reasoning: String,
    /// Sentiment/news inputs as opaque JSON.
    pub data_sources: serde_json::Value,
    /// Agent version tag.
    pub agent_version: String,
}

/// Aggregate statistics for a market category.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryStats {
    /// Number of resolved markets in the category.
    pub resolved_count: i64,
    /// Mean final yes probability across resolved markets.
    pub mean_resolved_yes: f64,
}

/// A row from the `markets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct MarketRow {
    id: Uuid,
    slug: String,
    question: String,
    category: String,
    yes_prob: f64,
    no_prob: f64,
    volume: Decimal,
    status: String,
    claim_id: Option<Uuid>,
    closes_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MarketRow {
    fn into_market(self) -> Result<Market, DbError> {
        let status = MarketStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown market status: {}", self.status)))?;
        Ok(Market {
            id: MarketId::from(self.id),
            slug: self.slug,
            question: self.question,
            category: self.category,
            yes_prob: self.yes_prob,
            no_prob: self.no_prob,
            volume: self.volume,
            status,
            claim_id: self.claim_id.map(ClaimId::from),
            closes_at: self.closes_at,
            created_at: self.created_at,
        })
    }
}

/// Columns selected for every full market read.
const MARKET_COLUMNS: &str =
    "id, slug, question, category, yes_prob, no_prob, volume, status, claim_id, closes_at, \
     created_at";

/// Operations on markets, trades, prediction factors, and accounts.
pub struct MarketStore<'a> {
    pool: &'a PgPool,
}

impl<'a> MarketStore<'a> {
    /// Create a market store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch or create the reserved system actor account.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure.
    pub async fn ensure_system_account(
        &self,
        display_name: &str,
        initial_balance: Decimal,
    ) -> Result<Account, DbError> {
        let existing: Option<(Uuid, String, Decimal, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, display_name, balance, created_at FROM accounts WHERE is_system",
        )
        .fetch_optional(self.pool)
        .await?;

        if let Some((id, name, balance, created_at)) = existing {
            return Ok(Account {
                id: AccountId::from(id),
                display_name: name,
                is_system: true,
                balance,
                created_at,
            });
        }

        let id = AccountId::new();
        let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
            r"INSERT INTO accounts (id, display_name, is_system, balance)
              VALUES ($1, $2, TRUE, $3)
              RETURNING created_at",
        )
        .bind(id.into_inner())
        .bind(display_name)
        .bind(initial_balance)
        .fetch_one(self.pool)
        .await?;

        tracing::info!(account_id = %id, "Created system actor account");
        Ok(Account {
            id,
            display_name: display_name.to_owned(),
            is_system: true,
            balance: initial_balance,
            created_at,
        })
    }

    /// Create a market.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure (including a slug clash).
    pub async fn create(&self, market: &NewMarket) -> Result<MarketId, DbError> {
        let id = MarketId::new();
        let yes = market.yes_prob.clamp(0.0, 1.0);
        sqlx::query(
            r"INSERT INTO markets
                  (id, slug, question, category, yes_prob, no_prob, status, claim_id, closes_at)
              VALUES ($1, $2, $3, $4, $5, $6, 'open', $7, $8)",
        )
        .bind(id.into_inner())
        .bind(&market.slug)
        .bind(&market.question)
        .bind(&market.category)
        .bind(yes)
        .bind(1.0 - yes)
        .bind(market.claim_id.map(ClaimId::into_inner))
        .bind(market.closes_at)
        .execute(self.pool)
        .await?;
        Ok(id)
    }

    /// Fetch a market by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn get(&self, id: MarketId) -> Result<Option<Market>, DbError> {
        let query = format!("SELECT {MARKET_COLUMNS} FROM markets WHERE id = $1");
        let row: Option<MarketRow> = sqlx::query_as(&query)
            .bind(id.into_inner())
            .fetch_optional(self.pool)
            .await?;
        row.map(MarketRow::into_market).transpose()
    }

    /// Open markets created within the last hour that have no trades yet.
    ///
    /// These are the seeding candidates for `seed_new_markets`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn fresh_unseeded(&self, limit: i64) -> Result<Vec<Market>, DbError> {
        let cutoff = Utc::now() - Duration::hours(1);
        let query = format!(
            "SELECT {MARKET_COLUMNS} FROM markets m
             WHERE m.status = 'open'
               AND m.created_at >= $1
               AND NOT EXISTS (SELECT 1 FROM trades t WHERE t.market_id = m.id)
             ORDER BY m.created_at
             LIMIT $2"
        );
        let rows: Vec<MarketRow> = sqlx::query_as(&query)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(MarketRow::into_market).collect()
    }

    /// Open markets ordered by assessment staleness (never-assessed first,
    /// then oldest assessment). Bounds the tier-1 and tier-2 ticks.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn open_by_staleness(&self, limit: i64) -> Result<Vec<Market>, DbError> {
        let query = format!(
            "SELECT {MARKET_COLUMNS} FROM markets m
             WHERE m.status = 'open'
             ORDER BY (
                 SELECT max(f.computed_at) FROM prediction_factors f
                 WHERE f.market_id = m.id
             ) ASC NULLS FIRST, m.created_at
             LIMIT $1"
        );
        let rows: Vec<MarketRow> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(MarketRow::into_market).collect()
    }

    /// Number of trades placed on a market.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn trade_count(&self, id: MarketId) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM trades WHERE market_id = $1")
                .bind(id.into_inner())
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Resolved-market statistics for a category (seeding base rates).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn category_stats(&self, category: &str) -> Result<CategoryStats, DbError> {
        let row: (i64, Option<f64>) = sqlx::query_as(
            r"SELECT count(*), avg(yes_prob)
              FROM markets WHERE category = $1 AND status = 'resolved'",
        )
        .bind(category)
        .fetch_one(self.pool)
        .await?;
        Ok(CategoryStats {
            resolved_count: row.0,
            mean_resolved_yes: row.1.unwrap_or(0.5),
        })
    }

    /// Recent markets in a category, for the seeding context.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query or decode failure.
    pub async fn recent_in_category(
        &self,
        category: &str,
        limit: i64,
    ) -> Result<Vec<Market>, DbError> {
        let query = format!(
            "SELECT {MARKET_COLUMNS} FROM markets
             WHERE category = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        let rows: Vec<MarketRow> = sqlx::query_as(&query)
            .bind(category)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(MarketRow::into_market).collect()
    }

    /// Place a trade and move the market price, atomically.
    ///
    /// One transaction: debit the account, record the trade at the current
    /// price, update the market probabilities and volume. The account
    /// balance check constraint rejects overdrafts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] on failure (including insufficient
    /// balance); nothing is applied.
    pub async fn place_trade(
        &self,
        market_id: MarketId,
        account_id: AccountId,
        side: TradeSide,
        amount: Decimal,
        new_yes_prob: f64,
    ) -> Result<TradeId, DbError> {
        let trade_id = TradeId::new();
        let yes = new_yes_prob.clamp(0.0, 1.0);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE accounts SET balance = balance - $2 WHERE id = $1")
            .bind(account_id.into_inner())
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        let (price,): (f64,) =
            sqlx::query_as("SELECT yes_prob FROM markets WHERE id = $1 FOR UPDATE")
                .bind(market_id.into_inner())
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r"INSERT INTO trades (id, market_id, account_id, side, amount, price)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(trade_id.into_inner())
        .bind(market_id.into_inner())
        .bind(account_id.into_inner())
        .bind(side.as_str())
        .bind(amount)
        .bind(price)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"UPDATE markets
              SET yes_prob = $2, no_prob = $3, volume = volume + $4
              WHERE id = $1 AND status = 'open'",
        )
        .bind(market_id.into_inner())
        .bind(yes)
        .bind(1.0 - yes)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            market_id = %market_id,
            trade_id = %trade_id,
            side = side.as_str(),
            amount = %amount,
            new_yes_prob = yes,
            "Trade placed"
        );
        Ok(trade_id)
    }

    /// Append an agent assessment. Append-only; the latest wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append_factor(&self, factor: &NewFactor) -> Result<FactorId, DbError> {
        let id = FactorId::new();
        sqlx::query(
            r"INSERT INTO prediction_factors
                  (id, market_id, assessed_prob, confidence, reasoning,
                   data_sources, agent_version)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id.into_inner())
        .bind(factor.market_id.into_inner())
        .bind(factor.assessed_prob)
        .bind(factor.confidence)
        .bind(&factor.reasoning)
        .bind(&factor.data_sources)
        .bind(&factor.agent_version)
        .execute(self.pool)
        .await?;
        Ok(id)
    }

    /// The latest agent assessment for a market, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_factor(
        &self,
        market_id: MarketId,
    ) -> Result<Option<PredictionFactor>, DbError> {
        let row: Option<(
            Uuid,
            f64,
            f64,
            String,
            serde_json::Value,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r"SELECT id, assessed_prob, confidence, reasoning, data_sources,
                     agent_version, computed_at
              FROM prediction_factors
              WHERE market_id = $1
              ORDER BY computed_at DESC
              LIMIT 1",
        )
        .bind(market_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(id, assessed_prob, confidence, reasoning, data_sources, agent_version, computed_at)| {
                PredictionFactor {
                    id: FactorId::from(id),
                    market_id,
                    assessed_prob,
                    confidence,
                    reasoning,
                    data_sources,
                    agent_version,
                    computed_at,
                }
            },
        ))
    }

    /// Top up every non-system account by `amount` (the monthly credit
    /// grant). Returns the number of accounts credited.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn topup_all_accounts(&self, amount: Decimal) -> Result<u64, DbError> {
        let result =
            sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE NOT is_system")
                .bind(amount)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
