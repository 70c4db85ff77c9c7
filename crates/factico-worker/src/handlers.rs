//! Task handlers: the pipeline logic behind every task kind.
//!
//! Handlers are idempotent keyed on the payload's primary id: replaying
//! `process_source` on a processed source is a no-op, seed ticks skip
//! markets that already have trades, and snapshot replacements are
//! atomic. At-least-once delivery is safe throughout.

use chrono::{Duration as ChronoDuration, Utc};
use factico_db::{
    ClaimStore, EnqueueOptions, EntityLink, MarketStore, NewClaim, NotificationStore, SourceStore,
    StatsStore, TaskQueue, TopicLink, TrendingStore,
};
use factico_market::{MarketAgent, MarketAgentConfig};
use factico_rag::ContextBuilder;
use factico_trending::{detect, TrendDoc, TrendWeights};
use factico_types::{
    ExtractionOutcome, Platform, ProcessSourcePayload, SourceState, TaskKind, TaskMessage,
    Verdict, WriteEmbeddingPayload,
};
use factico_verifier::{ClaimExtractor, Classifier, Orchestrator, VerifierError};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::error::HandlerError;

/// Sources eligible for automatic failure retry per scrape tick.
const FAILED_RETRY_BATCH: i64 = 100;

/// Dispatch one task to its handler.
///
/// # Errors
///
/// Returns [`HandlerError`] when the handler fails; the worker loop
/// Nacks and the bus policy takes over.
pub async fn handle(ctx: &AppContext, task: &TaskMessage) -> Result<(), HandlerError> {
    match task.kind {
        TaskKind::ProcessSource => {
            let payload: ProcessSourcePayload = serde_json::from_value(task.payload.clone())?;
            process_source(ctx, payload).await
        }
        TaskKind::WriteEmbedding => {
            let payload: WriteEmbeddingPayload = serde_json::from_value(task.payload.clone())?;
            write_embedding(ctx, payload).await
        }
        TaskKind::ScrapeSources => scrape_sources(ctx).await,
        TaskKind::DetectTrendingTopics => detect_trending(ctx).await,
        TaskKind::SeedNewMarkets => {
            market_agent(ctx).seed_new_markets().await?;
            Ok(())
        }
        TaskKind::Tier1MarketUpdate => {
            market_agent(ctx).tier1_update().await?;
            Ok(())
        }
        TaskKind::Tier2MarketAnalysis => {
            market_agent(ctx).tier2_analysis().await?;
            Ok(())
        }
        TaskKind::ReassessInactiveMarkets => {
            market_agent(ctx).reassess_inactive().await?;
            Ok(())
        }
        TaskKind::MonthlyCreditTopup => monthly_topup(ctx).await,
        TaskKind::StatsRollup => {
            StatsStore::new(ctx.pool.pool()).rollup().await?;
            Ok(())
        }
    }
}

/// The full verification pipeline for one source.
///
/// Extract, build context, verify, classify, persist. Every terminal
/// outcome advances the source state; every retryable failure records a
/// failure on the source and propagates so the task is Nacked.
async fn process_source(ctx: &AppContext, payload: ProcessSourcePayload) -> Result<(), HandlerError> {
    let sources = SourceStore::new(ctx.pool.pool());
    let claims = ClaimStore::new(ctx.pool.pool());

    let Some(source) = sources.get(payload.source_id).await? else {
        warn!(source_id = %payload.source_id, "source vanished, acking");
        return Ok(());
    };

    // Idempotent replay: terminal sources are done.
    match source.state {
        SourceState::Processed | SourceState::Skipped => {
            debug!(source_id = %source.id, state = source.state.as_str(), "replay no-op");
            return Ok(());
        }
        SourceState::Failed if source.attempts >= 3 => {
            debug!(source_id = %source.id, "terminally failed, acking");
            return Ok(());
        }
        SourceState::Pending | SourceState::Failed => {}
    }

    // 1. Extract a claim (or a skip decision).
    let extractor = ClaimExtractor::new(&ctx.providers, &ctx.prompts);
    let outcome = match extractor
        .extract(&source.content, &source.author, source.platform.as_str())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return fail_source(ctx, payload, e).await,
    };

    let claim_text = match outcome {
        ExtractionOutcome::Skip(reason) => {
            sources.mark_skipped(source.id, reason).await?;
            info!(source_id = %source.id, reason = reason.as_str(), "source skipped");
            return Ok(());
        }
        ExtractionOutcome::Claim(text) => text,
    };

    // 2. Build the verification context.
    let builder = ContextBuilder::new(
        ctx.pool.pool(),
        &ctx.providers,
        &ctx.search,
        &ctx.fetcher,
        &ctx.credibility,
    )
    .with_dedup_threshold(ctx.config.pipeline.dedup_similarity);

    let context = match builder.build(&claim_text, Some(&source.url)).await {
        Ok(context) => context,
        Err(e) => {
            sources.mark_failed(source.id, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    // 3. Duplicate: link without re-running the orchestrator.
    if let Some(duplicate) = context.duplicate_of {
        claims.link_duplicate(source.id, duplicate.claim_id).await?;
        return Ok(());
    }

    // 4. Verify.
    let orchestrator = Orchestrator::new(&ctx.providers, &ctx.prompts).with_budget(
        Duration::from_secs(ctx.config.pipeline.orchestrator_budget_secs),
    );
    let verdict = match orchestrator.verify(&context).await {
        Ok(verdict) => verdict,
        Err(e) => return fail_source(ctx, payload, e).await,
    };

    // 5. Classify entities and topics. Classification failures degrade
    //    to an unlinked claim rather than blocking the verdict.
    let classifier = Classifier::new(&ctx.providers, &ctx.prompts);
    let entities = match classifier.entities(&claim_text).await {
        Ok(entities) => entities,
        Err(e) => {
            warn!(error = %e, "entity classification failed, persisting without links");
            Vec::new()
        }
    };
    let topics = match classifier.topics(&claim_text, &ctx.taxonomy).await {
        Ok(topics) => topics,
        Err(e) => {
            warn!(error = %e, "topic classification failed, persisting without links");
            Vec::new()
        }
    };

    // 6. Persist atomically.
    let claim_id = claims
        .persist_verdict(
            source.id,
            &NewClaim {
                text: claim_text,
                original_text: source.content.clone(),
                verdict: verdict.verdict,
                explanation: verdict.explanation,
                confidence: verdict.confidence,
                evidence_strength: verdict.strength,
            },
            &context.evidence,
            &entities
                .into_iter()
                .map(|e| EntityLink {
                    kind: e.kind,
                    canonical_name: e.canonical_name,
                })
                .collect::<Vec<_>>(),
            &topics
                .into_iter()
                .map(|t| TopicLink {
                    topic_id: t.topic_id,
                    confidence: t.confidence,
                })
                .collect::<Vec<_>>(),
        )
        .await?;

    // 7. Queue the low-priority embedding write.
    let queue = TaskQueue::new(ctx.pool.pool());
    let embed_payload = serde_json::to_value(WriteEmbeddingPayload { claim_id })?;
    queue
        .enqueue(
            TaskKind::WriteEmbedding,
            &embed_payload,
            EnqueueOptions {
                delay: None,
                unique_key: Some(format!("embed:{claim_id}")),
                priority: -1,
            },
        )
        .await?;

    Ok(())
}

/// Bookkeeping for a task cancelled at the overall deadline.
///
/// The handler future was dropped mid-flight, so its own failure path
/// never ran. A `process_source` task must still record the failure on
/// the source; otherwise an exhausted task dead-letters while the source
/// sits in `pending` forever, invisible to the retry sweep and to
/// operators. Other kinds have no per-row state to advance (a missing
/// embedding or a stale aggregate is repaired by the next tick).
pub async fn record_deadline_failure(ctx: &AppContext, task: &TaskMessage) {
    if task.kind != TaskKind::ProcessSource {
        return;
    }
    let payload: ProcessSourcePayload = match serde_json::from_value(task.payload.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(task_id = %task.id, error = %e, "deadline bookkeeping: bad payload");
            return;
        }
    };
    match SourceStore::new(ctx.pool.pool())
        .mark_failed(payload.source_id, "task deadline exceeded")
        .await
    {
        Ok(attempts) => warn!(
            source_id = %payload.source_id,
            attempts = attempts,
            "source failed at task deadline"
        ),
        // Already terminal (the persist committed before the deadline
        // fired) or gone; nothing to record.
        Err(e) => debug!(
            source_id = %payload.source_id,
            error = %e,
            "deadline bookkeeping: no source state to advance"
        ),
    }
}

/// Record a source failure and propagate the verifier error.
///
/// Hard provider failures also raise an operator notification: retrying
/// with a revoked key only burns attempts.
async fn fail_source(
    ctx: &AppContext,
    payload: ProcessSourcePayload,
    error: VerifierError,
) -> Result<(), HandlerError> {
    if error.is_hard() {
        NotificationStore::new(ctx.pool.pool())
            .notify("provider_hard_failure", &error.to_string())
            .await?;
    }
    let attempts = SourceStore::new(ctx.pool.pool())
        .mark_failed(payload.source_id, &error.to_string())
        .await?;
    warn!(
        source_id = %payload.source_id,
        attempts = attempts,
        error = %error,
        "source processing failed"
    );
    Err(HandlerError::Verifier(error))
}

/// One scrape tick: run adapters, insert sources, fan out tasks.
async fn scrape_sources(ctx: &AppContext) -> Result<(), HandlerError> {
    let sources = SourceStore::new(ctx.pool.pool());
    let queue = TaskQueue::new(ctx.pool.pool());
    let since = Utc::now() - ChronoDuration::hours(ctx.config.scrape.window_hours);

    let report = ctx.scraper.run(&ctx.config.scrape.keywords, since).await;

    for failure in &report.failures {
        if matches!(failure.error, factico_scrapers::ScraperError::Auth(_)) {
            NotificationStore::new(ctx.pool.pool())
                .notify(
                    "adapter_auth_failure",
                    &format!("{}: {}", failure.adapter, failure.error),
                )
                .await?;
        }
    }

    let inserted = sources.insert_batch(&report.sources).await?;
    let reopened = sources.reopen_failed(FAILED_RETRY_BATCH).await?;
    info!(
        scraped = report.sources.len(),
        inserted = inserted.len(),
        reopened = reopened.len(),
        failures = report.failures.len(),
        "scrape tick completed"
    );

    for source_id in inserted.into_iter().chain(reopened) {
        let payload = serde_json::to_value(ProcessSourcePayload { source_id })?;
        queue
            .enqueue(
                TaskKind::ProcessSource,
                &payload,
                EnqueueOptions {
                    delay: None,
                    unique_key: Some(format!("process_source:{source_id}")),
                    priority: 0,
                },
            )
            .await?;
    }
    Ok(())
}

/// Recompute the trending snapshot and source credibility aggregates.
async fn detect_trending(ctx: &AppContext) -> Result<(), HandlerError> {
    let sources = SourceStore::new(ctx.pool.pool());
    let trending = TrendingStore::new(ctx.pool.pool());
    let since = Utc::now() - ChronoDuration::hours(24);

    let docs: Vec<TrendDoc> = sources
        .window_for_trending(since)
        .await?
        .into_iter()
        .filter_map(|row| {
            let platform = Platform::parse(&row.platform)?;
            Some(TrendDoc {
                platform,
                content: row.content,
                captured_at: row.captured_at,
                verdict: row.verdict.as_deref().and_then(Verdict::parse),
            })
        })
        .collect();

    let weights = TrendWeights {
        trend: ctx.config.trending.weight_trend,
        velocity: ctx.config.trending.weight_velocity,
        correlation: ctx.config.trending.weight_correlation,
        relevance: ctx.config.trending.weight_relevance,
        risk: ctx.config.trending.weight_risk,
    };
    let taxonomy_names: Vec<String> =
        ctx.taxonomy.iter().map(|t| t.name.clone()).collect();
    let topics = detect(&docs, &taxonomy_names, weights, ctx.config.trending.top_n);
    info!(window_docs = docs.len(), topics = topics.len(), "trending recomputed");
    trending.replace_snapshot(&topics).await?;

    let credibility = trending.author_verdict_counts().await?;
    trending.upsert_credibility(&credibility).await?;
    Ok(())
}

/// Compute and store a claim's embedding.
async fn write_embedding(ctx: &AppContext, payload: WriteEmbeddingPayload) -> Result<(), HandlerError> {
    let claims = ClaimStore::new(ctx.pool.pool());
    let Some(claim) = claims.get(payload.claim_id).await? else {
        warn!(claim_id = %payload.claim_id, "claim vanished, acking");
        return Ok(());
    };

    match ctx.providers.embed(&claim.text).await {
        Ok(embedding) => {
            claims.write_embedding(claim.id, &embedding).await?;
            debug!(claim_id = %claim.id, dims = embedding.len(), "embedding written");
            Ok(())
        }
        // No embedding capability configured: dedup falls back to text
        // similarity permanently, which is not a task failure.
        Err(VerifierError::Unsupported(reason)) => {
            warn!(reason = reason, "embedding unsupported, skipping");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Grant the monthly credit top-up to every user account.
async fn monthly_topup(ctx: &AppContext) -> Result<(), HandlerError> {
    let amount = Decimal::from(ctx.config.accounts.monthly_topup);
    let credited = MarketStore::new(ctx.pool.pool())
        .topup_all_accounts(amount)
        .await?;
    info!(accounts = credited, amount = %amount, "monthly credit top-up applied");
    Ok(())
}

/// Construct the market agent over the shared context.
fn market_agent(ctx: &AppContext) -> MarketAgent<'_> {
    let config = MarketAgentConfig {
        min_seed_confidence: ctx.config.market.min_seed_confidence,
        tier1_batch: ctx.config.market.tier1_batch,
        high_stakes_categories: ctx.config.market.high_stakes_categories.clone(),
        ..MarketAgentConfig::default()
    };
    MarketAgent::new(
        ctx.pool.pool(),
        &ctx.providers,
        ctx.deep_providers.as_ref(),
        &ctx.prompts,
        ctx.system_account,
        config,
    )
}
