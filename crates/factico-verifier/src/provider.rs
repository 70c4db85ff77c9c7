//! LLM provider abstraction and implementations.
//!
//! Defines an enum-based dispatch for LLM providers, avoiding the
//! dyn-compatibility issues with async trait methods. Concrete
//! implementations exist for OpenAI-compatible APIs and the Anthropic
//! Messages API. All providers communicate over HTTP via `reqwest`.
//!
//! The pipeline does not care which model is behind the API -- it sends a
//! prompt and expects a text response containing JSON (see [`crate::parse`]),
//! or an embedding vector. Primary/fallback routing is composition in
//! [`ProviderPair`], never exception-style control flow.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cost::CostTracker;
use crate::error::VerifierError;
use crate::parse::extract_json;

/// A rendered prompt ready to send to a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System message establishing the task.
    pub system: String,
    /// User message with the material to analyze.
    pub user: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature (extraction and verification run low).
    pub temperature: f64,
}

/// Supported provider wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Configuration for a single LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// The wire format to speak.
    pub kind: ProviderKind,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier for completions.
    pub model: String,
    /// Model identifier for embeddings, when the provider supports them.
    pub embed_model: Option<String>,
}

// ---------------------------------------------------------------------------
// Unified provider enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// An LLM provider that can complete prompts and embed text.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiProvider),
    /// Anthropic Messages API.
    Anthropic(AnthropicProvider),
}

impl LlmProvider {
    /// Send a prompt and return the response text with token usage.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifierError`] classified as transient or hard.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, VerifierError> {
        match self {
            Self::OpenAi(provider) => provider.complete(request).await,
            Self::Anthropic(provider) => provider.complete(request).await,
        }
    }

    /// Embed a text into a float vector.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Unsupported`] for providers without an
    /// embeddings endpoint.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, VerifierError> {
        match self {
            Self::OpenAi(provider) => provider.embed(text).await,
            Self::Anthropic(_) => Err(VerifierError::Unsupported(
                "anthropic provider has no embeddings endpoint".to_owned(),
            )),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// A completed provider call: response text plus token usage.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Raw response text (expected to contain JSON).
    pub text: String,
    /// Input tokens reported by the provider, when available.
    pub input_tokens: u64,
    /// Output tokens reported by the provider, when available.
    pub output_tokens: u64,
}

/// Classify an HTTP status into transient or hard failure.
fn classify_status(status: reqwest::StatusCode, body: &str) -> VerifierError {
    if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || status == reqwest::StatusCode::PAYMENT_REQUIRED
    {
        VerifierError::ProviderHard(format!("{status}: {body}"))
    } else {
        // 429 and 5xx are retryable; so is anything else unexpected.
        VerifierError::ProviderTransient(format!("{status}: {body}"))
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible provider
// ---------------------------------------------------------------------------

/// Provider for OpenAI-compatible chat completions and embeddings APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions` and `{api_url}/embeddings`.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    embed_model: Option<String>,
}

impl OpenAiProvider {
    /// Create a new `OpenAI`-compatible provider.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
        }
    }

    /// Send a prompt and return the response text with usage.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, VerifierError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VerifierError::ProviderTransient(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(classify_status(status, &error_body));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            VerifierError::ProviderTransient(format!("OpenAI response parse failed: {e}"))
        })?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                VerifierError::Parse(
                    "OpenAI response missing choices[0].message.content".to_owned(),
                )
            })?;

        Ok(Completion {
            text,
            input_tokens: usage_field(&json, "prompt_tokens"),
            output_tokens: usage_field(&json, "completion_tokens"),
        })
    }

    /// Embed a text via `{api_url}/embeddings`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VerifierError> {
        let embed_model = self.embed_model.as_ref().ok_or_else(|| {
            VerifierError::Unsupported("no embedding model configured".to_owned())
        })?;
        let url = format!("{}/embeddings", self.api_url);

        let body = serde_json::json!({
            "model": embed_model,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VerifierError::ProviderTransient(format!("embedding request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(classify_status(status, &error_body));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            VerifierError::ProviderTransient(format!("embedding response parse failed: {e}"))
        })?;

        json.get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                #[allow(clippy::cast_possible_truncation)]
                let collected: Vec<f32> = values
                    .iter()
                    .filter_map(serde_json::Value::as_f64)
                    .map(|v| v as f32)
                    .collect();
                collected
            })
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                VerifierError::Parse("embedding response missing data[0].embedding".to_owned())
            })
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API provider
// ---------------------------------------------------------------------------

/// Provider for the Anthropic Messages API.
///
/// Anthropic uses a different request format from `OpenAI`:
/// - `x-api-key` header instead of `Authorization: Bearer`
/// - system is a top-level field, not a message
/// - the response text lives at `content[0].text`
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic Messages API provider.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Send a prompt and return the response text with usage.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, VerifierError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [
                {"role": "user", "content": request.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VerifierError::ProviderTransient(format!("Anthropic request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(classify_status(status, &error_body));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            VerifierError::ProviderTransient(format!("Anthropic response parse failed: {e}"))
        })?;

        let text = json
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                VerifierError::Parse("Anthropic response missing content[0].text".to_owned())
            })?;

        Ok(Completion {
            text,
            input_tokens: usage_field(&json, "input_tokens"),
            output_tokens: usage_field(&json, "output_tokens"),
        })
    }
}

/// Read a numeric usage field from a provider response, defaulting to zero.
fn usage_field(json: &serde_json::Value, field: &str) -> u64 {
    json.get("usage")
        .and_then(|u| u.get(field))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Factory and primary/fallback composition
// ---------------------------------------------------------------------------

/// Create an LLM provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> LlmProvider {
    match config.kind {
        ProviderKind::OpenAi => LlmProvider::OpenAi(OpenAiProvider::new(config)),
        ProviderKind::Anthropic => LlmProvider::Anthropic(AnthropicProvider::new(config)),
    }
}

/// A primary provider with an optional fallback, a shared cost tracker, and
/// a per-call timeout.
///
/// The fallback is tried only when the primary fails transiently or times
/// out. Hard failures (auth, quota) propagate immediately -- a second
/// provider will not fix a revoked key, and the operator needs to know.
pub struct ProviderPair {
    primary: LlmProvider,
    fallback: Option<LlmProvider>,
    cost: Arc<CostTracker>,
    call_timeout: Duration,
}

impl ProviderPair {
    /// Compose a provider pair.
    pub const fn new(
        primary: LlmProvider,
        fallback: Option<LlmProvider>,
        cost: Arc<CostTracker>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            cost,
            call_timeout,
        }
    }

    /// Complete a prompt and parse the response JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns the last provider error, or [`VerifierError::Parse`] when
    /// the response text is not the expected JSON shape.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        request: &CompletionRequest,
    ) -> Result<T, VerifierError> {
        let completion = self.complete_text(request).await?;
        extract_json(&completion.text)
    }

    /// Complete a prompt, returning raw text, with fallback and cost
    /// accounting.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when no fallback is configured or the
    /// fallback also fails.
    pub async fn complete_text(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, VerifierError> {
        match self.call_one(&self.primary, request, "primary").await {
            Ok(completion) => Ok(completion),
            Err(e) if e.is_transient() => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        error = %e,
                        fallback = fallback.name(),
                        "primary provider failed, trying fallback"
                    );
                    self.call_one(fallback, request, "fallback").await
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Embed a text using whichever provider supports embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Unsupported`] when neither provider has an
    /// embeddings endpoint.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, VerifierError> {
        match timeout(self.call_timeout, self.primary.embed(text)).await {
            Ok(Ok(vector)) => Ok(vector),
            Ok(Err(VerifierError::Unsupported(_))) | Err(_) => match &self.fallback {
                Some(fallback) => timeout(self.call_timeout, fallback.embed(text))
                    .await
                    .map_err(|_| VerifierError::Timeout(self.call_timeout))?,
                None => Err(VerifierError::Unsupported(
                    "no provider with embeddings configured".to_owned(),
                )),
            },
            Ok(Err(e)) => Err(e),
        }
    }

    /// One provider call under the per-call timeout, with cost recording.
    async fn call_one(
        &self,
        provider: &LlmProvider,
        request: &CompletionRequest,
        tier: &str,
    ) -> Result<Completion, VerifierError> {
        let started = Instant::now();
        let result = timeout(self.call_timeout, provider.complete(request))
            .await
            .map_err(|_| VerifierError::Timeout(self.call_timeout))?;

        match &result {
            Ok(completion) => {
                self.cost
                    .record_call(tier, completion.input_tokens, completion.output_tokens);
                debug!(
                    provider = provider.name(),
                    tier = tier,
                    latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    input_tokens = completion.input_tokens,
                    output_tokens = completion.output_tokens,
                    "provider call completed"
                );
            }
            Err(e) => {
                debug!(
                    provider = provider.name(),
                    tier = tier,
                    error = %e,
                    "provider call failed"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_dispatches_correctly() {
        let openai_config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            api_url: "https://api.openai.com/v1".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
            embed_model: Some("test-embed".to_owned()),
        };
        let provider = create_provider(&openai_config);
        assert_eq!(provider.name(), "openai-compatible");

        let anthropic_config = ProviderConfig {
            kind: ProviderKind::Anthropic,
            api_url: "https://api.anthropic.com/v1".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
            embed_model: None,
        };
        let provider = create_provider(&anthropic_config);
        assert_eq!(provider.name(), "anthropic");
    }

    #[tokio::test]
    async fn anthropic_embed_is_unsupported() {
        let config = ProviderConfig {
            kind: ProviderKind::Anthropic,
            api_url: "https://api.anthropic.com/v1".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
            embed_model: None,
        };
        let provider = create_provider(&config);
        let result = provider.embed("hola").await;
        assert!(matches!(result, Err(VerifierError::Unsupported(_))));
    }

    #[test]
    fn auth_status_is_hard_rate_limit_is_transient() {
        let auth = classify_status(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(auth.is_hard());
        let limited = classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(limited.is_transient());
        let server = classify_status(reqwest::StatusCode::BAD_GATEWAY, "upstream");
        assert!(server.is_transient());
    }
}
