//! Factico worker entry point.
//!
//! The worker is the deployable unit of the pipeline: it runs the
//! scheduler (behind a leader lease), the task bus consumer pool, and
//! every handler from scraping through verification to market
//! intelligence.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `factico-config.yaml`
//! 3. Connect to `PostgreSQL`, run migrations, verify the schema
//! 4. Seed the topic taxonomy and load it
//! 5. Ensure the reserved system actor account
//! 6. Build the LLM provider pairs, prompt engine, and cost tracker
//! 7. Build the search client, evidence fetcher, and scrape driver
//! 8. Spawn the scheduler and run the worker pool
//! 9. On shutdown, log the LLM cost summary

mod config;
mod context;
mod error;
mod handlers;
mod scheduler;
mod worker;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use factico_db::{MarketStore, PostgresConfig, PostgresPool, TaxonomyStore};
use factico_rag::{CredibilityMap, EvidenceFetcher, FetchConfig, SearchConfig, WebSearchClient};
use factico_scrapers::{
    ForumConfig, ForumScraper, RssConfig, RssScraper, ScrapeDriver, ScraperAdapter, SocialConfig,
    SocialShortScraper, VideoConfig, VideoScraper,
};
use factico_verifier::{
    create_provider, CostTracker, PromptEngine, ProviderConfig, ProviderKind, ProviderPair,
};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{ProviderEntry, WorkerConfig};
use crate::context::AppContext;
use crate::scheduler::Scheduler;
use crate::worker::WorkerPool;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails; the process exits nonzero.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("factico-worker starting");

    // 2. Load configuration.
    let config_path =
        std::env::var("FACTICO_CONFIG").unwrap_or_else(|_| "factico-config.yaml".to_owned());
    let config = WorkerConfig::from_file(Path::new(&config_path))?;
    info!(
        config_path = config_path,
        worker_concurrency = config.pipeline.worker_concurrency,
        dedup_similarity = config.pipeline.dedup_similarity,
        "configuration loaded"
    );

    // 3. Connect to PostgreSQL, migrate, and verify the schema.
    let pg_config = PostgresConfig::new(&config.database.url)
        .with_max_connections(config.database.max_connections);
    let pool = PostgresPool::connect(&pg_config).await?;
    pool.run_migrations().await?;
    pool.check_schema().await?;

    // 4. Seed and load the topic taxonomy.
    let taxonomy_store = TaxonomyStore::new(pool.pool());
    let seed: Vec<(String, String)> = config
        .taxonomy
        .iter()
        .map(|t| (t.name.clone(), t.slug.clone()))
        .collect();
    taxonomy_store.seed_topics(&seed).await?;
    let taxonomy = taxonomy_store.all_topics().await?;
    info!(topics = taxonomy.len(), "taxonomy loaded");

    // 5. Ensure the reserved system actor.
    let system_account = MarketStore::new(pool.pool())
        .ensure_system_account(
            &config.accounts.system_actor_name,
            Decimal::from(config.accounts.system_initial_balance),
        )
        .await?;
    info!(account_id = %system_account.id, "system actor ready");

    // 6. Build the cost tracker and provider pairs.
    let cost = Arc::new(cost_tracker(&config));
    let call_timeout = Duration::from_secs(config.llm.call_timeout_secs);

    let primary = create_provider(&provider_config(&config.llm.primary)?);
    let fallback = config
        .llm
        .fallback
        .as_ref()
        .map(|entry| provider_config(entry).map(|c| create_provider(&c)))
        .transpose()?;
    let providers = ProviderPair::new(primary, fallback, Arc::clone(&cost), call_timeout);
    info!(model = config.llm.primary.model, "primary provider configured");

    let deep_providers = config
        .llm
        .deep
        .as_ref()
        .map(|entry| {
            provider_config(entry).map(|c| {
                ProviderPair::new(
                    create_provider(&c),
                    None,
                    Arc::clone(&cost),
                    call_timeout,
                )
            })
        })
        .transpose()?;

    let prompts = PromptEngine::new(&config.templates_dir)?;
    info!(templates_dir = config.templates_dir, "prompt templates loaded");

    // 7. Build the retrieval and scraping components.
    let search = WebSearchClient::new(SearchConfig {
        api_url: config.search.api_url.clone(),
        api_key: config.search.api_key.clone(),
        country_tld: config.search.country_tld.clone(),
        max_results: config.search.max_results,
    });
    let fetcher = EvidenceFetcher::new(FetchConfig::default());
    let credibility = CredibilityMap::new()
        .with_blacklist(config.credibility.blacklist.clone())
        .with_vetted(config.credibility.vetted_press.clone());
    let scraper = build_scrape_driver(&config);

    let ctx = Arc::new(AppContext {
        pool: pool.clone(),
        providers,
        deep_providers,
        prompts,
        search,
        fetcher,
        credibility,
        scraper,
        config,
        system_account: system_account.id,
        taxonomy,
        cost: Arc::clone(&cost),
    });

    // 8. Spawn the scheduler and run the worker pool.
    let holder_id = format!("factico-{}", uuid::Uuid::now_v7());
    let scheduler = Scheduler::new(pool.clone(), holder_id.clone());
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    let worker = WorkerPool::new(Arc::clone(&ctx), holder_id);
    tokio::select! {
        () = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // 9. Log the cost summary and close.
    scheduler_handle.abort();
    let summary = cost.summary();
    info!(
        llm_calls = summary.total_calls,
        input_tokens = summary.total_input_tokens,
        output_tokens = summary.total_output_tokens,
        estimated_cost = %summary.total_estimated_cost,
        "LLM cost summary"
    );
    pool.close().await;
    Ok(())
}

/// Map a config provider entry onto the verifier's provider config.
fn provider_config(entry: &ProviderEntry) -> Result<ProviderConfig, String> {
    let kind = match entry.kind.to_lowercase().as_str() {
        "openai" | "deepseek" | "ollama" => ProviderKind::OpenAi,
        "anthropic" | "claude" => ProviderKind::Anthropic,
        other => return Err(format!("unknown provider kind: {other}")),
    };
    Ok(ProviderConfig {
        kind,
        api_url: entry.api_url.clone(),
        api_key: entry.api_key.clone(),
        model: entry.model.clone(),
        embed_model: entry.embed_model.clone(),
    })
}

/// Build the cost tracker from the configured per-million-token rates.
fn cost_tracker(config: &WorkerConfig) -> CostTracker {
    let primary_input = config.llm.primary.cost_per_m_input.unwrap_or(Decimal::ZERO);
    let primary_output = config
        .llm
        .primary
        .cost_per_m_output
        .unwrap_or(Decimal::ZERO);
    let (fallback_input, fallback_output) = config
        .llm
        .fallback
        .as_ref()
        .map_or((Decimal::ZERO, Decimal::ZERO), |entry| {
            (
                entry.cost_per_m_input.unwrap_or(Decimal::ZERO),
                entry.cost_per_m_output.unwrap_or(Decimal::ZERO),
            )
        });
    CostTracker::new(primary_input, primary_output, fallback_input, fallback_output)
}

/// Construct the scrape driver from the enabled adapters.
fn build_scrape_driver(config: &WorkerConfig) -> ScrapeDriver {
    let mut adapters = Vec::new();

    if let Some(social) = &config.scrape.social {
        adapters.push(ScraperAdapter::SocialShort(SocialShortScraper::new(
            SocialConfig {
                api_url: social.api_url.clone(),
                api_key: social.api_key.clone(),
                max_results: config.scrape.max_results,
            },
        )));
    }
    if !config.scrape.rss_feeds.is_empty() {
        adapters.push(ScraperAdapter::NewsRss(RssScraper::new(RssConfig {
            feeds: config.scrape.rss_feeds.clone(),
            default_outlet: config.scrape.rss_default_outlet.clone(),
        })));
    }
    if let Some(video) = &config.scrape.video {
        adapters.push(ScraperAdapter::Video(VideoScraper::new(VideoConfig {
            api_url: video.api_url.clone(),
            api_key: video.api_key.clone(),
            max_results: config.scrape.max_results,
        })));
    }
    if let Some(forum_url) = &config.scrape.forum_api_url {
        adapters.push(ScraperAdapter::Forum(ForumScraper::new(ForumConfig {
            api_url: forum_url.clone(),
            max_results: config.scrape.max_results,
        })));
    }

    info!(adapters = adapters.len(), "scrape driver configured");
    ScrapeDriver::new(
        adapters,
        config.scrape.concurrency,
        config.scrape.rate_capacity,
        config.scrape.rate_per_sec,
    )
}
