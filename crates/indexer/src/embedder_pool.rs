//! C5: the embedder pool. A small provider registry in front of whichever embedding backends
//! are configured — the bundled local ONNX model (grounded on
//! `indexcore_vector_store::Embedder`) plus any remote HTTP providers reachable over `reqwest`
//! and gated by a `<NAME>_API_KEY` environment variable, mirroring `vyotiq-ai`'s
//! `EmbeddingManager` provider-selection pattern. Callers ask for a provider by name (or let
//! the pool pick the first available one); the pool handles batch splitting, availability
//! caching, and retry with backoff so the coordinator itself stays backend-agnostic.

use async_trait::async_trait;
use dashmap::DashMap;
use indexcore_protocol::{EmbedderProvider, IndexError, Result};
use indexcore_vector_store::Embedder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const DEFAULT_MAX_BATCH_SIZE: usize = 64;
const AVAILABILITY_TTL: Duration = Duration::from_secs(300);
const RETRY_DELAYS_MS: [u64; 3] = [1_000, 2_000, 4_000];

#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    fn info(&self) -> EmbedderProvider;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn health_check(&self) -> bool;
}

/// Wraps the bundled local ONNX embedder so it satisfies [`EmbedderBackend`].
pub struct LocalEmbedderBackend {
    embedder: Arc<Embedder>,
}

impl LocalEmbedderBackend {
    #[must_use]
    pub fn new(embedder: Arc<Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl EmbedderBackend for LocalEmbedderBackend {
    fn info(&self) -> EmbedderProvider {
        EmbedderProvider {
            name: "local".to_string(),
            available: true,
            model: self.embedder.model_id().to_string(),
            dimensions: self.embedder.dimension(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            requires_api_key: false,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embedder
            .embed_texts(&borrowed)
            .await
            .map_err(|e| IndexError::Transient { message: e.to_string() })
    }

    async fn health_check(&self) -> bool {
        self.embedder.embed_texts(&["ping"]).await.is_ok()
    }
}

/// A remote HTTP embedding provider. Expects a JSON API of the shape
/// `{"input": [...]} -> {"embeddings": [[f32...]]}`, which is how most hosted embedding
/// endpoints (OpenAI-compatible or otherwise) shape this call.
pub struct RemoteEmbedderBackend {
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl RemoteEmbedderBackend {
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, api_key: String, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Builds a backend from `<NAME>_API_KEY`/`<NAME>_ENDPOINT` environment variables, or
    /// `None` if the key isn't set — the pool treats an unset key as "not configured" rather
    /// than an error.
    pub fn from_env(name: &str, default_endpoint: &str, model: &str, dimensions: usize) -> Option<Self> {
        let key_var = format!("{}_API_KEY", name.to_uppercase());
        let api_key = std::env::var(&key_var).ok()?;
        let endpoint_var = format!("{}_ENDPOINT", name.to_uppercase());
        let endpoint = std::env::var(&endpoint_var).unwrap_or_else(|_| default_endpoint.to_string());
        Some(Self::new(name, endpoint, api_key, model, dimensions))
    }
}

#[derive(serde::Serialize)]
struct RemoteEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(serde::Deserialize)]
struct RemoteEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbedderBackend for RemoteEmbedderBackend {
    fn info(&self) -> EmbedderProvider {
        EmbedderProvider {
            name: self.name.clone(),
            available: true,
            model: self.model.clone(),
            dimensions: self.dimensions,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            requires_api_key: true,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&RemoteEmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| IndexError::Transient { message: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(IndexError::ProviderUnavailable {
                message: format!("{} returned {status}", self.name),
                hints: vec!["check API key and rate limits".to_string()],
            });
        }

        let parsed: RemoteEmbedResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Fatal { message: format!("malformed response from {}: {e}", self.name) })?;
        Ok(parsed.embeddings)
    }

    async fn health_check(&self) -> bool {
        self.embed(&["ping".to_string()]).await.is_ok()
    }
}

struct AvailabilityEntry {
    available: bool,
    checked_at: Instant,
}

/// Fans out embedding requests across registered providers, caching per-provider availability
/// so a flaky remote backend doesn't get health-checked on every call, and retrying transient
/// failures with exponential backoff before giving up.
pub struct EmbedderPool {
    backends: DashMap<String, Arc<dyn EmbedderBackend>>,
    availability: DashMap<String, AvailabilityEntry>,
    default_provider: RwLockDefault,
}

/// Tracks which provider name to use when a caller doesn't specify one; set once at
/// construction from the first registered backend, updatable if that backend is later removed.
struct RwLockDefault(tokio::sync::RwLock<Option<String>>);

impl EmbedderPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
            availability: DashMap::new(),
            default_provider: RwLockDefault(tokio::sync::RwLock::new(None)),
        }
    }

    pub async fn register(&self, name: impl Into<String>, backend: Arc<dyn EmbedderBackend>) {
        let name = name.into();
        self.backends.insert(name.clone(), backend);
        let mut default = self.default_provider.0.write().await;
        if default.is_none() {
            *default = Some(name);
        }
    }

    pub fn providers(&self) -> Vec<EmbedderProvider> {
        self.backends.iter().map(|entry| entry.value().info()).collect()
    }

    async fn is_available(&self, name: &str, backend: &Arc<dyn EmbedderBackend>) -> bool {
        if let Some(entry) = self.availability.get(name) {
            if entry.checked_at.elapsed() < AVAILABILITY_TTL {
                return entry.available;
            }
        }
        let available = backend.health_check().await;
        self.availability.insert(
            name.to_string(),
            AvailabilityEntry { available, checked_at: Instant::now() },
        );
        available
    }

    async fn resolve(&self, provider: Option<&str>) -> Result<(String, Arc<dyn EmbedderBackend>)> {
        let name = match provider {
            Some(name) => name.to_string(),
            None => self
                .default_provider
                .0
                .read()
                .await
                .clone()
                .ok_or_else(|| IndexError::Configuration { message: "no embedder provider registered".to_string() })?,
        };
        let backend = self
            .backends
            .get(&name)
            .map(|e| e.value().clone())
            .ok_or_else(|| IndexError::Configuration { message: format!("unknown embedder provider: {name}") })?;

        if !self.is_available(&name, &backend).await {
            return Err(IndexError::provider_unavailable(
                format!("provider {name} failed its health check"),
                vec!["verify the provider's API key and network reachability".to_string()],
            ));
        }
        Ok((name, backend))
    }

    /// Confirms `provider` (or the default) is registered and currently healthy, returning its
    /// capabilities. Callers that are about to create durable state (collections, spaces) for a
    /// project should call this first so a misconfigured or unreachable provider fails fast with
    /// actionable hints instead of surfacing later, per-chunk, inside the indexing pass.
    pub async fn validate(&self, provider: Option<&str>) -> Result<EmbedderProvider> {
        let (_, backend) = self.resolve(provider).await?;
        Ok(backend.info())
    }

    /// Capabilities of a specific registered provider, without a health check.
    pub fn capabilities(&self, provider: &str) -> Result<EmbedderProvider> {
        self.backends
            .get(provider)
            .map(|e| e.value().info())
            .ok_or_else(|| IndexError::Configuration { message: format!("unknown embedder provider: {provider}") })
    }

    /// Embeds `texts` through `provider` (or the default), splitting into batches of at most
    /// the provider's `max_batch_size` and retrying each batch up to three times with
    /// exponential backoff on [`IndexError::is_retryable`] failures.
    pub async fn embed(&self, provider: Option<&str>, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let (name, backend) = self.resolve(provider).await?;
        let max_batch_size = backend.info().max_batch_size.max(1);

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(max_batch_size) {
            out.extend(self.embed_batch_with_retry(&name, &backend, chunk).await?);
        }
        Ok(out)
    }

    async fn embed_batch_with_retry(
        &self,
        name: &str,
        backend: &Arc<dyn EmbedderBackend>,
        batch: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let mut last_err = None;
        for (attempt, delay_ms) in std::iter::once(0).chain(RETRY_DELAYS_MS).enumerate() {
            if attempt > 0 {
                sleep(Duration::from_millis(delay_ms)).await;
            }
            match backend.embed(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_retryable() && attempt < RETRY_DELAYS_MS.len() => {
                    log::warn!("embedder {name} batch attempt {attempt} failed: {err}, retrying");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| IndexError::Fatal { message: "embedding retries exhausted".to_string() }))
    }
}

impl Default for EmbedderPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyBackend {
        attempts: AtomicUsize,
        succeed_after: usize,
    }

    #[async_trait]
    impl EmbedderBackend for FlakyBackend {
        fn info(&self) -> EmbedderProvider {
            EmbedderProvider {
                name: "flaky".to_string(),
                available: true,
                model: "test".to_string(),
                dimensions: 2,
                max_batch_size: 8,
                requires_api_key: false,
            }
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.succeed_after {
                return Err(IndexError::Transient { message: "not yet".to_string() });
            }
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let pool = EmbedderPool::new();
        let backend = Arc::new(FlakyBackend { attempts: AtomicUsize::new(0), succeed_after: 2 });
        pool.register("flaky", backend).await;

        let result = pool.embed(None, &["hello".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn unknown_provider_is_a_configuration_error() {
        let pool = EmbedderPool::new();
        let err = pool.embed(Some("nope"), &["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, IndexError::Configuration { .. }));
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let pool = EmbedderPool::new();
        let result = pool.embed(None, &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn validate_surfaces_provider_unavailable_before_any_side_effects() {
        struct DeadBackend;
        #[async_trait]
        impl EmbedderBackend for DeadBackend {
            fn info(&self) -> EmbedderProvider {
                EmbedderProvider {
                    name: "dead".to_string(),
                    available: false,
                    model: "dead".to_string(),
                    dimensions: 4,
                    max_batch_size: 8,
                    requires_api_key: true,
                }
            }
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(IndexError::provider_unavailable("dead", vec![]))
            }
            async fn health_check(&self) -> bool {
                false
            }
        }

        let pool = EmbedderPool::new();
        pool.register("dead", Arc::new(DeadBackend)).await;
        let err = pool.validate(None).await.unwrap_err();
        assert!(matches!(err, IndexError::ProviderUnavailable { .. }));
    }

    #[tokio::test]
    async fn capabilities_reports_registered_provider_without_health_check() {
        let pool = EmbedderPool::new();
        let backend = Arc::new(FlakyBackend { attempts: AtomicUsize::new(0), succeed_after: 0 });
        pool.register("flaky", backend).await;
        let info = pool.capabilities("flaky").unwrap();
        assert_eq!(info.name, "flaky");
        assert!(pool.capabilities("nope").is_err());
    }
}
