//! News RSS adapter.
//!
//! Fetches configured feed URLs and parses them with `quick-xml`. The
//! content to fact-check is the item title plus its summary, with markup
//! stripped. RSS supplies no engagement metrics, so they stay `None`.

use chrono::{DateTime, Utc};
use factico_types::{Engagement, Platform, Source};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::warn;

use crate::error::ScraperError;
use crate::normalize::{normalize, RawItem};
use crate::social::check_status;

/// Configuration for the RSS adapter.
#[derive(Debug, Clone)]
pub struct RssConfig {
    /// Feed URLs to poll.
    pub feeds: Vec<String>,
    /// Outlet name used as the author when the feed has no channel title.
    pub default_outlet: String,
}

/// A parsed feed item.
#[derive(Debug, Default, Clone)]
struct FeedItem {
    title: String,
    link: String,
    description: String,
    guid: String,
    pub_date: Option<DateTime<Utc>>,
}

/// The RSS scraper.
pub struct RssScraper {
    client: reqwest::Client,
    config: RssConfig,
}

impl RssScraper {
    /// Create the adapter.
    pub fn new(config: RssConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch all configured feeds, keeping items published since the
    /// given time (items with unparseable dates are kept).
    ///
    /// # Errors
    ///
    /// Returns the first feed's error classification when every feed
    /// fails; partial feed failures degrade to fewer items.
    pub async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Source>, ScraperError> {
        let mut sources = Vec::new();
        let mut first_error: Option<ScraperError> = None;

        for feed_url in &self.config.feeds {
            match self.fetch_feed(feed_url).await {
                Ok((outlet, items)) => {
                    for item in items {
                        if item.pub_date.is_some_and(|d| d < since) {
                            continue;
                        }
                        sources.push(self.to_source(&outlet, item));
                    }
                }
                Err(e) => {
                    warn!(feed = feed_url, error = %e, "feed fetch failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) if sources.is_empty() && !self.config.feeds.is_empty() => Err(e),
            _ => Ok(sources),
        }
    }

    /// Fetch and parse one feed, returning the channel title and items.
    async fn fetch_feed(&self, url: &str) -> Result<(String, Vec<FeedItem>), ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::Transient(format!("feed request failed: {e}")))?;
        let response = check_status(response).await?;
        let xml = response
            .text()
            .await
            .map_err(|e| ScraperError::Transient(format!("feed body read failed: {e}")))?;

        let (channel_title, items) = parse_feed(&xml)?;
        let outlet = if channel_title.is_empty() {
            self.config.default_outlet.clone()
        } else {
            channel_title
        };
        Ok((outlet, items))
    }

    fn to_source(&self, outlet: &str, item: FeedItem) -> Source {
        let summary = strip_markup(&item.description);
        let content = if summary.is_empty() {
            item.title.clone()
        } else {
            format!("{}. {summary}", item.title)
        };
        let external_id = if item.guid.is_empty() {
            item.link.clone()
        } else {
            item.guid.clone()
        };
        normalize(
            Platform::NewsRss,
            RawItem {
                external_id,
                author: outlet.to_owned(),
                url: item.link,
                content,
                published_at: item.pub_date,
                engagement: Engagement::default(),
            },
        )
    }
}

/// Parse an RSS document into its channel title and items.
fn parse_feed(xml: &str) -> Result<(String, Vec<FeedItem>), ScraperError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut channel_title = String::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" | b"entry" => current = Some(FeedItem::default()),
                b"title" => field = Some(Field::Title),
                b"link" => field = Some(Field::Link),
                b"description" | b"summary" => field = Some(Field::Description),
                b"guid" | b"id" => field = Some(Field::Guid),
                b"pubDate" | b"published" | b"updated" => field = Some(Field::PubDate),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().map(|s| s.into_owned()).unwrap_or_default();
                apply_field(&mut channel_title, current.as_mut(), field, &text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                apply_field(&mut channel_title, current.as_mut(), field, &text);
            }
            Ok(Event::End(e)) => {
                if matches!(e.name().as_ref(), b"item" | b"entry")
                    && let Some(item) = current.take()
                {
                    items.push(item);
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ScraperError::Parse(format!("feed XML parse failed: {e}")));
            }
        }
    }

    Ok((channel_title, items))
}

/// Which item field the parser is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    Guid,
    PubDate,
}

/// Route text content into the right field of the current item (or the
/// channel title when outside any item).
fn apply_field(
    channel_title: &mut String,
    current: Option<&mut FeedItem>,
    field: Option<Field>,
    text: &str,
) {
    let Some(field) = field else {
        return;
    };
    match current {
        Some(item) => match field {
            Field::Title => item.title.push_str(text),
            Field::Link => item.link.push_str(text),
            Field::Description => item.description.push_str(text),
            Field::Guid => item.guid.push_str(text),
            Field::PubDate => {
                if item.pub_date.is_none() {
                    item.pub_date = parse_date(text);
                }
            }
        },
        None => {
            if field == Field::Title && channel_title.is_empty() {
                channel_title.push_str(text);
            }
        }
    }
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom) timestamps.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(text.trim()))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip markup tags from a feed summary.
fn strip_markup(text: &str) -> String {
    let stripped = Regex::new(r"(?s)<[^>]+>")
        .map(|re| re.replace_all(text, " ").into_owned())
        .unwrap_or_else(|_| text.to_owned());
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>El Diario Economía</title>
    <item>
      <title>El banco central sube la tasa a 11.00%</title>
      <link>https://example.mx/tasa</link>
      <guid>nota-123</guid>
      <description><![CDATA[<p>La Junta de Gobierno <b>aumentó</b> la tasa de referencia.</p>]]></description>
      <pubDate>Fri, 21 Mar 2026 15:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Sube el desempleo</title>
      <link>https://example.mx/desempleo</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_channel_and_items() {
        let (channel, items) = parse_feed(SAMPLE_FEED).unwrap_or_default();
        assert_eq!(channel, "El Diario Economía");
        assert_eq!(items.len(), 2);

        let first = items.first().cloned().unwrap_or_default();
        assert_eq!(first.title, "El banco central sube la tasa a 11.00%");
        assert_eq!(first.guid, "nota-123");
        assert!(first.description.contains("aumentó"));
        assert!(first.pub_date.is_some());
    }

    #[test]
    fn item_without_date_or_guid_is_kept() {
        let (_, items) = parse_feed(SAMPLE_FEED).unwrap_or_default();
        let second = items.get(1).cloned().unwrap_or_default();
        assert_eq!(second.guid, "");
        assert!(second.pub_date.is_none());
    }

    #[test]
    fn markup_is_stripped_from_summaries() {
        assert_eq!(
            strip_markup("<p>La <b>tasa</b>\nsubió</p>"),
            "La tasa subió"
        );
    }

    #[test]
    fn date_parsing_covers_rss_and_atom() {
        assert!(parse_date("Fri, 21 Mar 2026 15:00:00 GMT").is_some());
        assert!(parse_date("2026-03-21T15:00:00Z").is_some());
        assert!(parse_date("ayer").is_none());
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let result = parse_feed("<rss><channel><item></rss>");
        assert!(result.is_err());
    }
}
