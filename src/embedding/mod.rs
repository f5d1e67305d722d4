//! Embedding provider implementations.
//!
//! Every provider implements the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]**: always errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashingEmbedder`]**: deterministic offline bag-of-words vectors; no model download.
//! - **`LocalEmbedder`**: runs a model in-process via fastembed (feature `local-embeddings-fastembed`).
//!
//! # Provider Selection
//!
//! ```rust
//! # use coursemaster::config::EmbeddingConfig;
//! # use coursemaster::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! The HTTP providers make one attempt plus up to `embedding.max_retries`
//! retries for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! With the default `max_retries = 0` a failure reaches the caller
//! immediately and the indexing request fails as a whole.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::warn;

use coursemaster_core::embedding::Embedder;
pub use coursemaster_core::embedding::HashingEmbedder;
use coursemaster_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;

/// Vector size of the `hash` provider when `embedding.dims` is unset.
pub const DEFAULT_HASH_DIMS: usize = 384;

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Create the [`Embedder`] named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"hash"` | [`HashingEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(local::LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// An embedder that refuses every request.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::new(
            "embedding provider is disabled; set embedding.provider in the config",
        ))
    }
}

// ============ HTTP plumbing ============

/// Connection settings shared by the HTTP providers.
struct HttpSettings {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `url`, retrying rate limits, server errors, and
    /// network errors up to `max_retries` times.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, EmbeddingError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(provider = label, attempt, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            EmbeddingError::new(format!("{} returned invalid JSON: {}", label, e))
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = EmbeddingError::new(format!(
                        "{} API error {}: {}",
                        label, status, body_text
                    ));
                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(EmbeddingError::new(format!(
                        "{} connection error ({}): {}",
                        label, url, e
                    )));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbeddingError::new(format!("{} embedding failed", label))))
    }
}

fn parse_vector(value: &serde_json::Value, label: &str) -> Result<Vec<f32>, EmbeddingError> {
    let values = value.as_array().ok_or_else(|| {
        EmbeddingError::new(format!("Invalid {} response: embedding is not an array", label))
    })?;
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                EmbeddingError::new(format!("Invalid {} response: non-numeric value", label))
            })
        })
        .collect()
}

fn required_model(config: &EmbeddingConfig, label: &str) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", label))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", label))?;
    Ok((model, dims))
}

// ============ OpenAI Provider ============

/// Embedder backed by `POST /v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable. `embedding.url`
/// may point at an OpenAI-compatible server.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
    http: HttpSettings,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model(config, "OpenAI")?;
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let base = config.url.as_deref().unwrap_or(OPENAI_URL);
        Ok(Self {
            model,
            dims,
            endpoint: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = self
            .http
            .post_json("OpenAI", &self.endpoint, Some(&self.api_key), &body)
            .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::new("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| EmbeddingError::new("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedder backed by a local Ollama instance (`POST /api/embed`).
///
/// Requires an embedding model pulled into Ollama (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    endpoint: String,
    http: HttpSettings,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = required_model(config, "Ollama")?;
        let base = config.url.as_deref().unwrap_or(OLLAMA_URL);
        Ok(Self {
            model,
            dims,
            endpoint: format!("{}/api/embed", base.trim_end_matches('/')),
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = self.http.post_json("Ollama", &self.endpoint, None, &body).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbeddingError::new("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|v| parse_vector(v, "Ollama"))
        .collect()
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
mod local {
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use coursemaster_core::embedding::Embedder;
    use coursemaster_core::error::EmbeddingError;

    use crate::config::EmbeddingConfig;

    /// In-process embedder. The model is downloaded from Hugging Face on
    /// first use and cached; later runs need no network.
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        kind: fastembed::EmbeddingModel,
        batch_size: usize,
        model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
            let (kind, native_dims) = resolve(&model_name)?;
            Ok(Self {
                model_name,
                dims: config.dims.unwrap_or(native_dims),
                kind,
                batch_size: config.batch_size,
                model: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn resolve(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
        use fastembed::EmbeddingModel as M;
        Ok(match name {
            "all-minilm-l6-v2" => (M::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (M::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (M::BGEBaseENV15, 768),
            "bge-large-en-v1.5" => (M::BGELargeENV15, 1024),
            "nomic-embed-text-v1.5" => (M::NomicEmbedTextV15, 768),
            "multilingual-e5-small" => (M::MultilingualE5Small, 384),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small",
                other
            ),
        })
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let slot = Arc::clone(&self.model);
            let kind = self.kind.clone();
            let batch_size = self.batch_size;
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = slot
                    .lock()
                    .map_err(|_| EmbeddingError::new("local model lock poisoned"))?;
                if guard.is_none() {
                    let loaded = fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(kind).with_show_download_progress(false),
                    )
                    .map_err(|e| {
                        EmbeddingError::new(format!("Failed to initialize local model: {}", e))
                    })?;
                    *guard = Some(loaded);
                }
                let model = guard
                    .as_mut()
                    .ok_or_else(|| EmbeddingError::new("local model unavailable"))?;
                model
                    .embed(texts, Some(batch_size))
                    .map_err(|e| EmbeddingError::new(format!("Local embedding failed: {}", e)))
            })
            .await
            .map_err(|e| EmbeddingError::new(format!("embedding task failed: {}", e)))?
        }
    }
}
