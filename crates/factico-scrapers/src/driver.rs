//! The scrape driver: runs enabled adapters in parallel.
//!
//! Adapters share one normalized boundary ([`factico_types::Source`]) and
//! run concurrently, bounded by a semaphore and per-adapter token-bucket
//! rate limiting. Transient adapter failures skip the adapter for this
//! tick (the next schedule retries); auth failures are reported so the
//! worker can raise an operator notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use factico_types::{Platform, Source};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::forum::ForumScraper;
use crate::rate::RateLimiter;
use crate::rss::RssScraper;
use crate::social::SocialShortScraper;
use crate::video::VideoScraper;

/// One platform adapter behind enum dispatch (async methods keep enums
/// dyn-incompatible, same trade-off as the LLM providers).
pub enum ScraperAdapter {
    /// Short-post social network.
    SocialShort(SocialShortScraper),
    /// News RSS feeds.
    NewsRss(RssScraper),
    /// Video transcripts.
    Video(VideoScraper),
    /// Community forum.
    Forum(ForumScraper),
}

impl ScraperAdapter {
    /// Fetch normalized sources from the platform.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's [`ScraperError`] classification.
    pub async fn fetch(
        &self,
        keywords: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Source>, ScraperError> {
        match self {
            Self::SocialShort(scraper) => scraper.fetch(keywords, since).await,
            Self::NewsRss(scraper) => scraper.fetch(since).await,
            Self::Video(scraper) => scraper.fetch(keywords, since).await,
            Self::Forum(scraper) => scraper.fetch(keywords, since).await,
        }
    }

    /// Stable adapter name for logs and rate-limit keys.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SocialShort(_) => "social_short",
            Self::NewsRss(_) => "news_rss",
            Self::Video(_) => "video",
            Self::Forum(_) => "forum",
        }
    }

    /// The platform this adapter produces.
    pub const fn platform(&self) -> Platform {
        match self {
            Self::SocialShort(_) => Platform::SocialShort,
            Self::NewsRss(_) => Platform::NewsRss,
            Self::Video(_) => Platform::Video,
            Self::Forum(_) => Platform::Forum,
        }
    }
}

/// An adapter failure surfaced by the driver.
#[derive(Debug)]
pub struct AdapterFailure {
    /// The failing adapter's name.
    pub adapter: &'static str,
    /// The error.
    pub error: ScraperError,
}

/// Result of one scrape tick across all adapters.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// All normalized sources, across adapters.
    pub sources: Vec<Source>,
    /// Adapter failures this tick (auth failures need operator alerts).
    pub failures: Vec<AdapterFailure>,
}

/// The parallel scrape driver.
pub struct ScrapeDriver {
    adapters: Vec<ScraperAdapter>,
    limiter: RateLimiter,
    concurrency: Arc<Semaphore>,
}

impl ScrapeDriver {
    /// Create a driver over the enabled adapters.
    ///
    /// `concurrency` bounds adapters running at once; each adapter's token
    /// bucket holds `rate_capacity` tokens refilled at `rate_per_sec`.
    pub fn new(
        adapters: Vec<ScraperAdapter>,
        concurrency: usize,
        rate_capacity: u32,
        rate_per_sec: f64,
    ) -> Self {
        Self {
            adapters,
            limiter: RateLimiter::new(rate_capacity, rate_per_sec),
            concurrency: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Run one scrape tick.
    pub async fn run(&self, keywords: &[String], since: DateTime<Utc>) -> ScrapeReport {
        let fetches = self.adapters.iter().map(|adapter| {
            let semaphore = Arc::clone(&self.concurrency);
            async move {
                let _permit = semaphore.acquire().await.ok()?;

                if !self.limiter.try_acquire(adapter.name()) {
                    warn!(adapter = adapter.name(), "rate limited, skipping this tick");
                    return Some(Err(AdapterFailure {
                        adapter: adapter.name(),
                        error: ScraperError::RateLimited("local token bucket empty".to_owned()),
                    }));
                }

                match adapter.fetch(keywords, since).await {
                    Ok(sources) => {
                        info!(
                            adapter = adapter.name(),
                            count = sources.len(),
                            "adapter fetch completed"
                        );
                        Some(Ok(sources))
                    }
                    Err(error) => {
                        warn!(adapter = adapter.name(), error = %error, "adapter fetch failed");
                        Some(Err(AdapterFailure {
                            adapter: adapter.name(),
                            error,
                        }))
                    }
                }
            }
        });

        let mut report = ScrapeReport::default();
        for outcome in join_all(fetches).await.into_iter().flatten() {
            match outcome {
                Ok(sources) => report.sources.extend(sources),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_driver_produces_empty_report() {
        let driver = ScrapeDriver::new(Vec::new(), 4, 10, 1.0);
        let report = driver.run(&["tasa".to_owned()], Utc::now()).await;
        assert!(report.sources.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_reports_failure() {
        // A bucket with zero refill and capacity one: the second adapter
        // run in the same tick is skipped. Use two RSS adapters with the
        // same rate key by running the driver twice.
        let adapter = ScraperAdapter::NewsRss(RssScraper::new(crate::rss::RssConfig {
            feeds: Vec::new(),
            default_outlet: "prueba".to_owned(),
        }));
        let driver = ScrapeDriver::new(vec![adapter], 4, 1, 0.0);

        let first = driver.run(&[], Utc::now()).await;
        assert!(first.failures.is_empty(), "first tick consumes the token");

        let second = driver.run(&[], Utc::now()).await;
        assert_eq!(second.failures.len(), 1);
        assert!(matches!(
            second.failures.first().map(|f| &f.error),
            Some(ScraperError::RateLimited(_))
        ));
    }
}
