//! Web search client: a claim-derived query in, ranked URLs out.
//!
//! The search provider is a generic HTTP/JSON endpoint configured by URL
//! and key. Response parsing tolerates the common result-array shapes
//! (`results`, `organic`, `items`) so switching providers is a config
//! change, not a code change.

use serde_json::Value;
use tracing::debug;

use crate::error::RagError;

/// Words from the claim kept in the derived query.
const MAX_QUERY_WORDS: usize = 12;

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Result URL.
    pub url: String,
    /// Result title, when the provider supplies one.
    pub title: String,
    /// Zero-based rank in the provider's ordering.
    pub rank: usize,
}

/// Configuration for the web search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search endpoint URL.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Country top-level domain to restrict to (e.g. `mx`), when set.
    pub country_tld: Option<String>,
    /// Maximum results requested.
    pub max_results: usize,
}

/// The web search client.
pub struct WebSearchClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl WebSearchClient {
    /// Create a search client.
    pub fn new(config: SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Run a search for evidence about a claim.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Search`] when the HTTP call or response parse
    /// fails. Rate limits and 5xx are transient for the task layer.
    pub async fn search(&self, claim_text: &str) -> Result<Vec<SearchHit>, RagError> {
        let query = derive_query(claim_text, self.config.country_tld.as_deref());
        debug!(query = query, "web search");

        let body = serde_json::json!({
            "q": query,
            "count": self.config.max_results,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Search(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RagError::Search(format!("search returned {status}: {error_body}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| RagError::Search(format!("search response parse failed: {e}")))?;

        Ok(parse_hits(&json, self.config.max_results))
    }
}

/// Derive a search query from a claim: the leading words, optionally
/// site-restricted to a country TLD.
pub fn derive_query(claim_text: &str, country_tld: Option<&str>) -> String {
    let words: Vec<&str> = claim_text.split_whitespace().take(MAX_QUERY_WORDS).collect();
    let base = words.join(" ");
    match country_tld {
        Some(tld) if !tld.is_empty() => format!("{base} site:.{tld}"),
        _ => base,
    }
}

/// Parse ranked hits out of the common provider response shapes.
fn parse_hits(json: &Value, max: usize) -> Vec<SearchHit> {
    let array = ["results", "organic", "items"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_array));

    let Some(array) = array else {
        return Vec::new();
    };

    array
        .iter()
        .filter_map(|item| {
            let url = item
                .get("url")
                .or_else(|| item.get("link"))
                .and_then(Value::as_str)?;
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some((url.to_owned(), title.to_owned()))
        })
        .take(max)
        .enumerate()
        .map(|(rank, (url, title))| SearchHit { url, title, rank })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_takes_leading_words_and_tld() {
        let claim = "El banco central subió la tasa de interés de referencia a 11.00% el 21 de marzo según el comunicado";
        let query = derive_query(claim, Some("mx"));
        assert!(query.ends_with("site:.mx"));
        assert!(query.starts_with("El banco central"));
        // 12 claim words plus the site restriction.
        assert_eq!(query.split_whitespace().count(), 13);
    }

    #[test]
    fn query_without_tld() {
        assert_eq!(derive_query("corta frase", None), "corta frase");
    }

    #[test]
    fn parse_results_shape() {
        let json = serde_json::json!({
            "results": [
                {"url": "https://a.mx/1", "title": "Uno"},
                {"url": "https://b.mx/2", "title": "Dos"}
            ]
        });
        let hits = parse_hits(&json, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits.first().map(|h| h.rank), Some(0));
    }

    #[test]
    fn parse_organic_shape_with_link_field() {
        let json = serde_json::json!({
            "organic": [
                {"link": "https://c.mx/3", "title": "Tres"}
            ]
        });
        let hits = parse_hits(&json, 10);
        assert_eq!(hits.first().map(|h| h.url.as_str()), Some("https://c.mx/3"));
    }

    #[test]
    fn parse_caps_at_max() {
        let json = serde_json::json!({
            "items": [
                {"url": "https://a.mx"}, {"url": "https://b.mx"}, {"url": "https://c.mx"}
            ]
        });
        assert_eq!(parse_hits(&json, 2).len(), 2);
    }

    #[test]
    fn parse_unknown_shape_is_empty() {
        let json = serde_json::json!({"hits": []});
        assert!(parse_hits(&json, 5).is_empty());
    }
}
