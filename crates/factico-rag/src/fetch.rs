//! Evidence fetching: URL in, extracted title and body text out.
//!
//! Fetches are memoized by URL for 24 hours, capped by a per-claim budget,
//! gated by a per-host concurrency limit, and individually bounded by a
//! short timeout. A failed fetch degrades that one document, never the
//! whole context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use factico_types::EvidenceDoc;
use futures::future::join_all;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::credibility::{domain_of, CredibilityMap};
use crate::search::SearchHit;

/// Memoization TTL for fetched evidence.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounded cache size for fetched evidence.
const CACHE_CAPACITY: usize = 2048;

/// Extracted body text cap per source (2 KiB).
const MAX_BODY_BYTES: usize = 2 * 1024;

/// A fetched and extracted document (the cacheable unit).
#[derive(Debug, Clone)]
pub struct FetchedDoc {
    /// Document title.
    pub title: String,
    /// Extracted body text, truncated.
    pub text: String,
}

/// Configuration for the evidence fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-fetch timeout (default 3 s).
    pub fetch_timeout: Duration,
    /// Concurrent fetches allowed per host.
    pub per_host_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(3),
            per_host_limit: 2,
        }
    }
}

/// The evidence fetcher.
pub struct EvidenceFetcher {
    client: reqwest::Client,
    cache: TtlCache<String, FetchedDoc>,
    host_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    config: FetchConfig,
}

impl EvidenceFetcher {
    /// Create a fetcher with its own cache.
    pub fn new(config: FetchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: TtlCache::new(CACHE_TTL, CACHE_CAPACITY),
            host_gates: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Fetch up to `budget` evidence documents for a set of search hits.
    ///
    /// Blacklisted domains are dropped before they consume budget. Failed
    /// fetches are logged and skipped. Returned documents carry tier and
    /// rank-derived relevance; the caller orders and truncates the set.
    pub async fn fetch_batch(
        &self,
        hits: &[SearchHit],
        budget: usize,
        credibility: &CredibilityMap,
    ) -> Vec<EvidenceDoc> {
        let candidates: Vec<&SearchHit> = hits
            .iter()
            .filter(|hit| {
                let domain = domain_of(&hit.url);
                if credibility.is_blacklisted(&domain) {
                    warn!(domain = domain, "dropping blacklisted evidence domain");
                    false
                } else {
                    true
                }
            })
            .take(budget)
            .collect();

        let fetches = candidates.iter().map(|hit| self.fetch_one(hit, credibility));
        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Fetch a single hit, consulting the cache first.
    async fn fetch_one(
        &self,
        hit: &SearchHit,
        credibility: &CredibilityMap,
    ) -> Option<EvidenceDoc> {
        let domain = domain_of(&hit.url);
        let tier = credibility.tier(&domain);
        let relevance = rank_relevance(hit.rank);

        if let Some(cached) = self.cache.get(&hit.url) {
            debug!(url = hit.url, "evidence cache hit");
            return Some(to_doc(hit, &domain, tier, relevance, cached));
        }

        let gate = self.host_gate(&domain);
        let _permit = gate.acquire().await.ok()?;

        let fetched = match timeout(self.config.fetch_timeout, self.fetch_raw(&hit.url)).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(_) => {
                warn!(url = hit.url, "evidence fetch timed out");
                return None;
            }
        };

        self.cache.insert(hit.url.clone(), fetched.clone());
        Some(to_doc(hit, &domain, tier, relevance, fetched))
    }

    /// The raw HTTP fetch and text extraction.
    async fn fetch_raw(&self, url: &str) -> Option<FetchedDoc> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = url, error = %e, "evidence fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(url = url, status = %response.status(), "evidence fetch rejected");
            return None;
        }
        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = url, error = %e, "evidence body read failed");
                return None;
            }
        };
        Some(extract_document(&html))
    }

    /// Per-host semaphore, created on first use.
    fn host_gate(&self, domain: &str) -> Arc<Semaphore> {
        let mut gates = match self.host_gates.lock() {
            Ok(gates) => gates,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            gates
                .entry(domain.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_host_limit))),
        )
    }
}

/// Relevance decays with search rank: rank 0 is 1.0, falling toward zero.
pub fn rank_relevance(rank: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let rank = rank as f64;
    (1.0 / 0.25f64.mul_add(rank, 1.0)).clamp(0.0, 1.0)
}

fn to_doc(
    hit: &SearchHit,
    domain: &str,
    tier: factico_types::CredibilityTier,
    relevance: f64,
    fetched: FetchedDoc,
) -> EvidenceDoc {
    let title = if fetched.title.is_empty() {
        hit.title.clone()
    } else {
        fetched.title
    };
    EvidenceDoc {
        url: hit.url.clone(),
        domain: domain.to_owned(),
        title,
        text: fetched.text,
        fetched_at: Utc::now(),
        tier,
        relevance,
    }
}

/// Extract title and readable body text from an HTML document.
pub fn extract_document(html: &str) -> FetchedDoc {
    let title = Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
        .ok()
        .and_then(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(&decode_entities(&strip_tags(m.as_str()))))
        .unwrap_or_default();

    let without_blocks = Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
        .map(|re| re.replace_all(html, " ").into_owned())
        .unwrap_or_else(|_| html.to_owned());

    let text = collapse_whitespace(&decode_entities(&strip_tags(&without_blocks)));
    FetchedDoc {
        title,
        text: truncate_bytes(&text, MAX_BODY_BYTES),
    }
}

/// Replace markup tags with spaces.
fn strip_tags(html: &str) -> String {
    Regex::new(r"(?s)<[^>]+>")
        .map(|re| re.replace_all(html, " ").into_owned())
        .unwrap_or_else(|_| html.to_owned())
}

/// Decode the HTML entities that matter for readable text.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Collapse runs of whitespace into single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate at a char boundary within the byte cap.
fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    text.get(..end).unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_body() {
        let html = r#"<html><head><title>Comunicado de prensa</title>
            <style>body { color: red; }</style></head>
            <body><script>var x = 1;</script>
            <h1>Tasa de referencia</h1>
            <p>La Junta de Gobierno decidi&oacute; aumentar la tasa a 11.00%.</p>
            </body></html>"#;
        let doc = extract_document(html);
        assert_eq!(doc.title, "Comunicado de prensa");
        assert!(doc.text.contains("Tasa de referencia"));
        assert!(doc.text.contains("11.00%"));
        assert!(!doc.text.contains("var x"), "scripts must be stripped");
        assert!(!doc.text.contains("color: red"), "styles must be stripped");
    }

    #[test]
    fn entities_are_decoded() {
        let doc = extract_document("<p>PIB &gt; 2% &amp; inflaci&#39;n</p>");
        assert!(doc.text.contains("> 2% &"));
    }

    #[test]
    fn body_is_truncated_to_cap() {
        let body = "palabra ".repeat(1000);
        let html = format!("<body><p>{body}</p></body>");
        let doc = extract_document(&html);
        assert!(doc.text.len() <= MAX_BODY_BYTES);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // Multi-byte chars must not be split.
        let text = "años ".repeat(600);
        let truncated = truncate_bytes(&text, 2048);
        assert!(truncated.len() <= 2048);
        assert!(truncated.is_char_boundary(truncated.len()));
    }

    #[test]
    fn relevance_decays_with_rank() {
        assert!((rank_relevance(0) - 1.0).abs() < 1e-9);
        assert!(rank_relevance(1) < rank_relevance(0));
        assert!(rank_relevance(8) < rank_relevance(2));
        assert!(rank_relevance(100) > 0.0);
    }
}
