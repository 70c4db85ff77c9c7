//! Normalization of platform items into [`Source`] records.
//!
//! `content` is the primary text to fact-check: a post body, an article
//! title plus summary, a transcript, or a forum post. It is capped at
//! 8 KiB before anything downstream sees it. Engagement metrics stay
//! `None` when the platform does not supply them. `captured_at` is the
//! ingestion time; the platform's publication time is kept separately.

use chrono::{DateTime, Utc};
use factico_types::{Engagement, Platform, Source, SourceId, SourceState, MAX_SOURCE_CONTENT_BYTES};

/// A platform item before normalization, as adapters produce it.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    /// Platform-native identifier.
    pub external_id: String,
    /// Author handle or outlet name.
    pub author: String,
    /// Canonical URL.
    pub url: String,
    /// The raw text.
    pub content: String,
    /// Publication time reported by the platform.
    pub published_at: Option<DateTime<Utc>>,
    /// Engagement metrics, when supplied.
    pub engagement: Engagement,
}

/// Normalize a raw platform item into a pending [`Source`].
pub fn normalize(platform: Platform, item: RawItem) -> Source {
    Source {
        id: SourceId::new(),
        platform,
        external_id: item.external_id,
        author: item.author.trim().to_owned(),
        url: item.url.trim().to_owned(),
        content: clean_content(&item.content),
        captured_at: Utc::now(),
        published_at: item.published_at,
        engagement: item.engagement,
        state: SourceState::Pending,
        attempts: 0,
        state_reason: None,
    }
}

/// Collapse whitespace and cap the content at the source limit.
fn clean_content(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_bytes(&collapsed, MAX_SOURCE_CONTENT_BYTES)
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
    fn content_is_collapsed_and_capped() {
        let item = RawItem {
            external_id: "p1".to_owned(),
            author: " @reportera ".to_owned(),
            url: " https://social.mx/p1 ".to_owned(),
            content: format!("línea uno\n\n  línea dos {}", "relleno ".repeat(2000)),
            published_at: None,
            engagement: Engagement::default(),
        };
        let source = normalize(Platform::SocialShort, item);
        assert!(source.content.starts_with("línea uno línea dos"));
        assert!(source.content.len() <= MAX_SOURCE_CONTENT_BYTES);
        assert_eq!(source.author, "@reportera");
        assert_eq!(source.url, "https://social.mx/p1");
        assert_eq!(source.state, SourceState::Pending);
    }

    #[test]
    fn absent_engagement_stays_none() {
        let source = normalize(
            Platform::NewsRss,
            RawItem {
                external_id: "guid-1".to_owned(),
                ..RawItem::default()
            },
        );
        assert_eq!(source.engagement.likes, None);
        assert_eq!(source.engagement.views, None);
    }

    #[test]
    fn captured_at_is_ingestion_time_not_publication() {
        let published = "2026-03-21T09:00:00Z"
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now());
        let source = normalize(
            Platform::NewsRss,
            RawItem {
                external_id: "guid-2".to_owned(),
                published_at: Some(published),
                ..RawItem::default()
            },
        );
        assert_eq!(source.published_at, Some(published));
        assert!(source.captured_at > published);
    }
}
