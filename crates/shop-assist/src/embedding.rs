//! Embedding backends and the provider fallback chain.
//!
//! Two implementations of the core [`EmbeddingProvider`] trait live
//! here:
//!
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible
//!   `/embeddings` endpoint with retry and exponential backoff.
//! - **[`EmbedderChain`]** — an ordered list of providers tried in
//!   sequence. The production configuration chains the network backend
//!   with the deterministic fallback, so a provider outage degrades to
//!   fallback vectors instead of failing reindexing or search.
//!
//! Which chain gets built is decided by [`create_embedder`] from the
//! configuration — never by environment sniffing inside business
//! logic.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tracing::warn;

use shop_assist_core::embedding::{EmbeddingProvider, FallbackEmbedder};
use shop_assist_core::{Error, Result};

use crate::config::EmbeddingConfig;

/// Embedding provider backed by an OpenAI-compatible API.
///
/// Requires the `OPENAI_API_KEY` environment variable; the base URL is
/// configurable so OpenRouter-style gateways work too.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> AnyResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::ProviderUnavailable {
            provider: self.model.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "encoding_format": "float",
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| self.unavailable(e.to_string()))?;
                        return self.parse_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(self.unavailable(format!("{status}: {body_text}")));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(self.unavailable(format!("{status}: {body_text}")));
                }
                Err(e) => {
                    last_err = Some(self.unavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| self.unavailable("embedding failed after retries")))
    }
}

impl OpenAiEmbedder {
    fn parse_response(&self, json: &serde_json::Value) -> Result<Vec<f32>> {
        let embedding = json
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|arr| arr.first())
            .and_then(|item| item.get("embedding"))
            .and_then(|e| e.as_array())
            .ok_or_else(|| self.unavailable("invalid response: missing data[0].embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vec.len() != self.dims {
            return Err(self.unavailable(format!(
                "expected {} dims, got {}",
                self.dims,
                vec.len()
            )));
        }

        Ok(vec)
    }
}

/// One attempt within an [`EmbedderChain`] invocation.
#[derive(Debug, Clone)]
pub struct EmbedAttempt {
    pub provider: String,
    pub error: Option<String>,
}

/// Ordered providers tried in sequence until one succeeds.
///
/// Failures of earlier providers are logged and recorded in the
/// attempt trace; callers are not required to distinguish which
/// provider produced the vector.
pub struct EmbedderChain {
    providers: Vec<Box<dyn EmbeddingProvider>>,
}

impl EmbedderChain {
    pub fn new(providers: Vec<Box<dyn EmbeddingProvider>>) -> Self {
        Self { providers }
    }

    /// Embed with the full attempt trace, for callers that surface it.
    pub async fn embed_with_trace(&self, text: &str) -> (Result<Vec<f32>>, Vec<EmbedAttempt>) {
        let mut attempts = Vec::with_capacity(self.providers.len());
        let mut last_err: Option<Error> = None;

        for provider in &self.providers {
            match provider.embed(text).await {
                Ok(vec) => {
                    attempts.push(EmbedAttempt {
                        provider: provider.model_name().to_string(),
                        error: None,
                    });
                    return (Ok(vec), attempts);
                }
                Err(e) => {
                    warn!(
                        provider = provider.model_name(),
                        error = %e,
                        "embedding provider failed, trying next in chain"
                    );
                    attempts.push(EmbedAttempt {
                        provider: provider.model_name().to_string(),
                        error: Some(e.to_string()),
                    });
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or(Error::ProviderUnavailable {
            provider: "embedder-chain".to_string(),
            reason: "no providers configured".to_string(),
        });
        (Err(err), attempts)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbedderChain {
    fn model_name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.model_name())
            .unwrap_or("embedder-chain")
    }

    fn dims(&self) -> usize {
        self.providers.first().map(|p| p.dims()).unwrap_or(0)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_trace(text).await.0
    }
}

/// Build the configured embedding chain.
///
/// | Config value | Chain |
/// |--------------|-------|
/// | `"openai"` | network backend, then deterministic fallback |
/// | `"fallback"` | deterministic fallback only |
pub fn create_embedder(config: &EmbeddingConfig) -> AnyResult<EmbedderChain> {
    match config.provider.as_str() {
        "openai" => Ok(EmbedderChain::new(vec![
            Box::new(OpenAiEmbedder::new(config)?),
            Box::new(FallbackEmbedder::with_dims(config.dims)),
        ])),
        "fallback" => Ok(EmbedderChain::new(vec![Box::new(
            FallbackEmbedder::with_dims(config.dims),
        )])),
        other => anyhow::bail!("Unknown embedding provider: '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "always-down"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::ProviderUnavailable {
                provider: "always-down".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn chain_falls_back_and_records_attempts() {
        let chain = EmbedderChain::new(vec![
            Box::new(FailingProvider),
            Box::new(FallbackEmbedder::with_dims(8)),
        ]);

        let (result, attempts) = chain.embed_with_trace("ciao").await;
        let vec = result.unwrap();
        assert_eq!(vec.len(), 8);
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].error.is_some());
        assert!(attempts[1].error.is_none());
        assert_eq!(attempts[1].provider, "deterministic-fallback");
    }

    #[tokio::test]
    async fn chain_with_no_survivors_errors() {
        let chain = EmbedderChain::new(vec![Box::new(FailingProvider)]);
        let (result, attempts) = chain.embed_with_trace("ciao").await;
        assert!(matches!(result, Err(Error::ProviderUnavailable { .. })));
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test]
    async fn fallback_chain_is_deterministic() {
        let config = EmbeddingConfig {
            provider: "fallback".to_string(),
            ..Default::default()
        };
        let chain = create_embedder(&config).unwrap();
        let a = chain.embed("mozzarella di bufala").await.unwrap();
        let b = chain.embed("mozzarella di bufala").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1536);
    }
}
