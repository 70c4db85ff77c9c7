//! Shared application context for handlers.
//!
//! Everything a task handler needs is constructed once at startup and
//! injected through this context: the connection pool, the provider
//! pairs, the prompt engine, the search and fetch clients, the scrape
//! driver, and the loaded taxonomy. No handler reaches for process-wide
//! state.

use std::sync::Arc;

use factico_db::PostgresPool;
use factico_rag::{CredibilityMap, EvidenceFetcher, WebSearchClient};
use factico_scrapers::ScrapeDriver;
use factico_types::{AccountId, Topic};
use factico_verifier::{CostTracker, PromptEngine, ProviderPair};

use crate::config::WorkerConfig;

/// Shared, immutable application state.
pub struct AppContext {
    /// The database pool.
    pub pool: PostgresPool,
    /// Primary/fallback provider pair for routine LLM work.
    pub providers: ProviderPair,
    /// Stronger provider pair for tier-2 and high-stakes market work.
    pub deep_providers: Option<ProviderPair>,
    /// Loaded prompt templates.
    pub prompts: PromptEngine,
    /// Web search client.
    pub search: WebSearchClient,
    /// Evidence fetcher with its memoization cache.
    pub fetcher: EvidenceFetcher,
    /// Domain credibility rules.
    pub credibility: CredibilityMap,
    /// The scrape driver over enabled adapters.
    pub scraper: ScrapeDriver,
    /// Worker configuration.
    pub config: WorkerConfig,
    /// The reserved system actor account.
    pub system_account: AccountId,
    /// The fixed topic taxonomy, loaded at startup.
    pub taxonomy: Vec<Topic>,
    /// Shared LLM cost tracker (logged at shutdown).
    pub cost: Arc<CostTracker>,
}
