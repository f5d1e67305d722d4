//! Configuration parsing and validation.
//!
//! CourseMaster is configured via a TOML file (default `config/coursemaster.toml`).
//! Every section is optional and falls back to the defaults below.
//!
//! ```toml
//! [store]
//! path = "./data/coursemaster.sqlite"
//!
//! [chunking]
//! chunk_size = 512   # words per chunk
//! overlap = 50       # words shared by consecutive chunks
//! min_chars = 50     # shorter extracted text is rejected
//!
//! [retrieval]
//! query_top_k = 5
//! chat_top_k = 10
//! summary_top_k = 15
//! quiz_top_k = 30
//!
//! [embedding]
//! provider = "ollama"            # disabled | openai | ollama | hash | local
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Validation happens in [`load_config`]; an invalid file is rejected up
//! front rather than failing on the first indexing request.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use coursemaster_core::chunk::{
    ChunkingParams, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_CHARS, DEFAULT_OVERLAP,
};
use coursemaster_core::engine::{EngineSettings, TopKDefaults};

/// Provider names accepted in `embedding.provider`.
pub const PROVIDERS: &[&str] = &["disabled", "openai", "ollama", "hash", "local"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/coursemaster.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}
fn default_min_chars() -> usize {
    DEFAULT_MIN_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_query_top_k")]
    pub query_top_k: usize,
    #[serde(default = "default_chat_top_k")]
    pub chat_top_k: usize,
    #[serde(default = "default_summary_top_k")]
    pub summary_top_k: usize,
    #[serde(default = "default_quiz_top_k")]
    pub quiz_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let d = TopKDefaults::default();
        Self {
            query_top_k: d.query,
            chat_top_k: d.chat,
            summary_top_k: d.summary,
            quiz_top_k: d.quiz,
        }
    }
}

fn default_query_top_k() -> usize {
    TopKDefaults::default().query
}
fn default_chat_top_k() -> usize {
    TopKDefaults::default().chat
}
fn default_summary_top_k() -> usize {
    TopKDefaults::default().summary
}
fn default_quiz_top_k() -> usize {
    TopKDefaults::default().quiz
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after a retryable HTTP failure. Zero means one attempt.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Whether `model` and `dims` must be given explicitly.
    fn requires_model(&self) -> bool {
        matches!(self.provider.as_str(), "openai" | "ollama")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// All defaults. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Engine tuning derived from the `chunking`, `retrieval`, and
    /// `embedding.batch_size` settings.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chunking: ChunkingParams {
                chunk_size: self.chunking.chunk_size,
                overlap: self.chunking.overlap,
                min_chars: self.chunking.min_chars,
            },
            batch_size: self.embedding.batch_size,
            top_k: TopKDefaults {
                query: self.retrieval.query_top_k,
                chat: self.retrieval.chat_top_k,
                summary: self.retrieval.summary_top_k,
                quiz: self.retrieval.quiz_top_k,
            },
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }

        let r = &self.retrieval;
        for (name, value) in [
            ("query_top_k", r.query_top_k),
            ("chat_top_k", r.chat_top_k),
            ("summary_top_k", r.summary_top_k),
            ("quiz_top_k", r.quiz_top_k),
        ] {
            if value < 1 {
                bail!("retrieval.{} must be >= 1", name);
            }
        }

        let e = &self.embedding;
        if !PROVIDERS.contains(&e.provider.as_str()) {
            bail!(
                "Unknown embedding provider: '{}'. Must be one of: {}.",
                e.provider,
                PROVIDERS.join(", ")
            );
        }
        if e.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if e.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if e.requires_model() {
            if e.dims.is_none() {
                bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
            if e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
        }

        Ok(())
    }
}

/// Read, parse, and validate the TOML config at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config TOML.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
