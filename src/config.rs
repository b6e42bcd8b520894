use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_csv_rows_per_chunk")]
    pub csv_rows_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            csv_rows_per_chunk: default_csv_rows_per_chunk(),
        }
    }
}

fn default_chunk_size() -> usize {
    1500
}
fn default_overlap() -> usize {
    300
}
fn default_csv_rows_per_chunk() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    /// Seconds a staged batch remains claimable after creation.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_retention_secs() -> i64 {
    1800
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Used-memory percentage above which concurrent fetch admission is halved.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_percent: f64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrency: default_max_concurrency(),
            page_limit: default_page_limit(),
            memory_threshold_percent: default_memory_threshold(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_max_depth() -> usize {
    3
}
fn default_max_concurrency() -> usize {
    10
}
fn default_page_limit() -> usize {
    20
}
fn default_memory_threshold() -> f64 {
    70.0
}
fn default_fetch_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Reject configurations that can never produce a working pipeline.
/// An overlap >= chunk_size would stall the chunk walk entirely, so it is
/// a startup-time fatal, not a per-request error.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be strictly less than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }
    if config.chunking.csv_rows_per_chunk == 0 {
        anyhow::bail!("chunking.csv_rows_per_chunk must be > 0");
    }

    if config.staging.retention_secs <= 0 {
        anyhow::bail!("staging.retention_secs must be > 0");
    }

    if !(1..=10).contains(&config.crawl.max_depth) {
        anyhow::bail!("crawl.max_depth must be in [1, 10]");
    }
    if !(1..=50).contains(&config.crawl.max_concurrency) {
        anyhow::bail!("crawl.max_concurrency must be in [1, 50]");
    }
    if !(1..=100).contains(&config.crawl.page_limit) {
        anyhow::bail!("crawl.page_limit must be in [1, 100]");
    }
    if !(0.0..=100.0).contains(&config.crawl.memory_threshold_percent) {
        anyhow::bail!("crawl.memory_threshold_percent must be in [0, 100]");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified for provider '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 for provider '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "gemini" => {}
        other => anyhow::bail!("Unknown generation provider: '{}'. Must be gemini.", other),
    }

    Ok(())
}
