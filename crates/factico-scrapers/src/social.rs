//! Short-post social network adapter.
//!
//! Speaks a JSON search API: `GET {api_url}/v2/search` with a bearer
//! token. Posts carry engagement metrics, which are kept as supplied
//! (absent metrics stay `None`).

use chrono::{DateTime, Utc};
use factico_types::{Engagement, Platform, Source};
use serde::Deserialize;

use crate::error::ScraperError;
use crate::normalize::{normalize, RawItem};

/// Configuration for the short-post social adapter.
#[derive(Debug, Clone)]
pub struct SocialConfig {
    /// API base URL.
    pub api_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Maximum posts per fetch.
    pub max_results: usize,
}

/// Response shape of the search endpoint.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    author: String,
    text: String,
    url: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metrics: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    #[serde(default)]
    likes: Option<i64>,
    #[serde(default)]
    shares: Option<i64>,
    #[serde(default)]
    replies: Option<i64>,
    #[serde(default)]
    views: Option<i64>,
}

/// The short-post social scraper.
pub struct SocialShortScraper {
    client: reqwest::Client,
    config: SocialConfig,
}

impl SocialShortScraper {
    /// Create the adapter.
    pub fn new(config: SocialConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch posts matching the keywords since the given time.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Auth`] on 401/403,
    /// [`ScraperError::RateLimited`] on 429, and
    /// [`ScraperError::Transient`] otherwise.
    pub async fn fetch(
        &self,
        keywords: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Source>, ScraperError> {
        let url = format!("{}/v2/search", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(&[
                ("query", keywords.join(" ")),
                ("since", since.to_rfc3339()),
                ("limit", self.config.max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScraperError::Transient(format!("social request failed: {e}")))?;

        let response = check_status(response).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::Parse(format!("social response parse failed: {e}")))?;

        Ok(parsed
            .posts
            .into_iter()
            .map(|post| {
                let engagement = post.metrics.map_or_else(Engagement::default, |m| Engagement {
                    likes: m.likes,
                    shares: m.shares,
                    comments: m.replies,
                    views: m.views,
                });
                normalize(
                    Platform::SocialShort,
                    RawItem {
                        external_id: post.id,
                        author: post.author,
                        url: post.url,
                        content: post.text,
                        published_at: post.created_at,
                        engagement,
                    },
                )
            })
            .collect())
    }
}

/// Map response status to the adapter error classification.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Err(ScraperError::Auth(format!("{status}: {body}")))
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(ScraperError::RateLimited(format!("{status}: {body}")))
    } else {
        Err(ScraperError::Transient(format!("{status}: {body}")))
    }
}
