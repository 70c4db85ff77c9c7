//! Video platform adapter.
//!
//! Fetches recently published videos matching the keywords and uses the
//! transcript as the content to fact-check. Videos without a transcript
//! are skipped at the adapter (nothing to verify).

use chrono::{DateTime, Utc};
use factico_types::{Engagement, Platform, Source};
use serde::Deserialize;

use crate::error::ScraperError;
use crate::normalize::{normalize, RawItem};
use crate::social::check_status;

/// Configuration for the video adapter.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// API base URL.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Maximum videos per fetch.
    pub max_results: usize,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    channel: String,
    url: String,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    stats: Option<VideoStats>,
}

#[derive(Debug, Deserialize)]
struct VideoStats {
    #[serde(default)]
    views: Option<i64>,
    #[serde(default)]
    likes: Option<i64>,
    #[serde(default)]
    comments: Option<i64>,
}

/// The video transcript scraper.
pub struct VideoScraper {
    client: reqwest::Client,
    config: VideoConfig,
}

impl VideoScraper {
    /// Create the adapter.
    pub fn new(config: VideoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch transcripts for recent videos matching the keywords.
    ///
    /// # Errors
    ///
    /// Same classification as the other adapters: auth is hard, the rest
    /// transient.
    pub async fn fetch(
        &self,
        keywords: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<Source>, ScraperError> {
        let url = format!("{}/videos/search", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(&[
                ("q", keywords.join(" ")),
                ("published_after", since.to_rfc3339()),
                ("limit", self.config.max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScraperError::Transient(format!("video request failed: {e}")))?;

        let response = check_status(response).await?;
        let parsed: VideoResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::Parse(format!("video response parse failed: {e}")))?;

        Ok(parsed
            .videos
            .into_iter()
            .filter_map(|video| {
                let transcript = video.transcript.filter(|t| !t.trim().is_empty())?;
                let engagement = video.stats.map_or_else(Engagement::default, |s| Engagement {
                    likes: s.likes,
                    shares: None,
                    comments: s.comments,
                    views: s.views,
                });
                Some(normalize(
                    Platform::Video,
                    RawItem {
                        external_id: video.id,
                        author: video.channel,
                        url: video.url,
                        content: transcript,
                        published_at: video.published_at,
                        engagement,
                    },
                ))
            })
            .collect())
    }
}
