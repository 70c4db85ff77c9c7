//! Community forum adapter.
//!
//! Fetches recent discussion posts matching the keywords. The post body
//! is the content to fact-check; score and comment counts map onto the
//! engagement metrics that exist for forums.

use chrono::{DateTime, Utc};
use factico_types::{Engagement, Platform, Source};
use serde::Deserialize;

use crate::error::ScraperError;
use crate::normalize::{normalize, RawItem};
use crate::social::check_status;

/// Configuration for the forum adapter.
#[derive(Debug, Clone)]
pub struct ForumConfig {
    /// API base URL.
    pub api_url: String,
    /// Maximum posts per fetch.
    pub max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ForumResponse {
    #[serde(default)]
    posts: Vec<ForumPost>,
}

#[derive(Debug, Deserialize)]
struct ForumPost {
    id: String,
    author: String,
    permalink: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
}

/// The community forum scraper.
pub struct ForumScraper {
    client: reqwest::Client,
    config: ForumConfig,
}

impl ForumScraper {
    /// Create the adapter.
    pub fn new(config: ForumConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch recent posts matching the keywords.
    ///
    /// # Errors
    ///
    /// Same classification as the other adapters.
    pub async fn fetch(
        &self,
        keywords: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Source>, ScraperError> {
        let url = format!("{}/posts/search", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", keywords.join(" ")),
                ("after", since.to_rfc3339()),
                ("limit", self.config.max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScraperError::Transient(format!("forum request failed: {e}")))?;

        let response = check_status(response).await?;
        let parsed: ForumResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::Parse(format!("forum response parse failed: {e}")))?;

        Ok(parsed
            .posts
            .into_iter()
            .map(|post| {
                let content = match (&post.title, &post.body) {
                    (Some(title), Some(body)) => format!("{title}. {body}"),
                    (Some(title), None) => title.clone(),
                    (None, Some(body)) => body.clone(),
                    (None, None) => String::new(),
                };
                normalize(
                    Platform::Forum,
                    RawItem {
                        external_id: post.id,
                        author: post.author,
                        url: post.permalink,
                        content,
                        published_at: post.created_at,
                        engagement: Engagement {
                            likes: post.score,
                            shares: None,
                            comments: post.num_comments,
                            views: None,
                        },
                    },
                )
            })
            .collect())
    }
}
