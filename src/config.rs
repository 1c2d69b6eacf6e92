//! TOML configuration for Rag Harness.
//!
//! ```toml
//! [store]
//! path = "./data/rh.sqlite"
//!
//! [chunking]
//! chunk_size = 500
//! overlap = 50
//!
//! [retrieval]
//! top_k = 5
//! min_score = 0.5
//!
//! [[knowledge_bases]]
//! id = "kb_rust"
//! name = "Rust notes"
//! default_content = "Ownership, borrowing, lifetimes..."
//! ```
//!
//! Every section except `[store]` may be omitted; missing values take the
//! defaults below.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use rag_harness_core::chunk::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use rag_harness_core::search::{DEFAULT_CACHE_SIZE, DEFAULT_MIN_SCORE, DEFAULT_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBaseConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite file backing the key-value store.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Chunks embedded between cooperative yields.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            cache_size: DEFAULT_CACHE_SIZE,
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}
fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}
fn default_embed_batch_size() -> usize {
    10
}

/// Remote document-to-text service used for PDF, Office, and image uploads.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Service endpoint. Without one, binary uploads are stored as
    /// unvectorized placeholders.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the service API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
    /// Extracted text shorter than this is treated as degraded.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_extraction_timeout(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

impl ExtractionConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

fn default_api_key_env() -> String {
    "RH_EXTRACTION_API_KEY".to_string()
}
fn default_extraction_timeout() -> u64 {
    60
}
fn default_min_content_chars() -> usize {
    50
}

/// Network fetch settings for external sources and URL ingestion.
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Prefix of the reader proxy that turns a web page into plain text.
    #[serde(default = "default_reader_prefix")]
    pub reader_prefix: String,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            reader_prefix: default_reader_prefix(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_reader_prefix() -> String {
    "https://r.jina.ai/".to_string()
}
fn default_fetch_timeout() -> u64 {
    30
}

/// A named collection queried as a unit by the aggregator.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct KnowledgeBaseConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Restrict document search to these ids. Omitted means the whole index.
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
    /// Built-in text matched by keywords when document search finds nothing.
    #[serde(default)]
    pub default_content: Option<String>,
}

fn default_enabled() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.min_score) {
        bail!("retrieval.min_score must be in [-1.0, 1.0]");
    }
    if config.retrieval.cache_size < 1 {
        bail!("retrieval.cache_size must be >= 1");
    }
    if config.retrieval.embed_batch_size < 1 {
        bail!("retrieval.embed_batch_size must be >= 1");
    }

    let mut seen = std::collections::HashSet::new();
    for kb in &config.knowledge_bases {
        if kb.id.trim().is_empty() {
            bail!("knowledge_bases entries need a non-empty id");
        }
        if !seen.insert(kb.id.as_str()) {
            bail!("duplicate knowledge base id: '{}'", kb.id);
        }
    }

    Ok(())
}
