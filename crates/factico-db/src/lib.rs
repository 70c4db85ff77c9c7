//! `PostgreSQL` data layer and durable task bus for Factico.
//!
//! `PostgreSQL` is the single durable store: sources, claims, evidence,
//! entities/topics, markets and trades, trending snapshots, statistics
//! counters, operator notifications, and the task bus all live here.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! so no live database is needed at build time. Schema evolution is
//! ordered migrations embedded in the binary; the worker refuses to start
//! when the applied schema is behind the embedded set.
//!
//! # Modules
//!
//! - [`postgres`] -- connection pool, migrations, schema guard
//! - [`source_store`] -- scraped sources and their state machine
//! - [`claim_store`] -- claims, evidence, links, similarity search
//! - [`taxonomy_store`] -- topics and entities (read side)
//! - [`market_store`] -- markets, trades, factors, credit accounts
//! - [`trending_store`] -- trending snapshots and source credibility
//! - [`stats_store`] -- incrementally maintained counters
//! - [`notification_store`] -- operator notifications
//! - [`task_queue`] -- the durable task bus
//! - [`scheduler_store`] -- leader lease and schedule bookkeeping

pub mod claim_store;
pub mod error;
pub mod market_store;
pub mod notification_store;
pub mod postgres;
pub mod scheduler_store;
pub mod source_store;
pub mod stats_store;
pub mod task_queue;
pub mod taxonomy_store;
pub mod trending_store;

pub use claim_store::{ClaimStore, EntityLink, NewClaim, TopicLink};
pub use error::DbError;
pub use market_store::{CategoryStats, MarketStore, NewFactor, NewMarket};
pub use notification_store::NotificationStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use scheduler_store::SchedulerStore;
pub use source_store::{SourceStore, TrendSourceRow};
pub use stats_store::StatsStore;
pub use task_queue::{DeadLetter, EnqueueOptions, TaskQueue};
pub use taxonomy_store::TaxonomyStore;
pub use trending_store::TrendingStore;
