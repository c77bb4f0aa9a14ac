//! Configuration management for ProtoLens
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with PROTOLENS__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};
use crate::index::DistanceMetric;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Embedding gateway configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation gateway configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Segmenter configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retriever configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Section extraction and summary configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: ollama, openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key (OpenAI-compatible providers only)
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Chunks embedded per batch during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: ollama, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API base URL
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Timeout for short answers
    #[serde(default = "default_quick_timeout")]
    pub quick_timeout_secs: u64,

    /// Timeout for grounded answers over retrieved context
    #[serde(default = "default_reading_timeout")]
    pub reading_timeout_secs: u64,

    /// Timeout for summary generation
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,

    /// Timeout for the warm-up probe
    #[serde(default = "default_warm_up_timeout")]
    pub warm_up_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Index backend: memory, pgvector
    #[serde(default = "default_index_backend")]
    pub backend: String,

    /// PostgreSQL URL (pgvector backend only)
    pub database_url: Option<String>,

    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Distance metric recorded when the collection is created
    #[serde(default)]
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,

    /// Trailing characters searched for a sentence boundary
    #[serde(default = "default_snap_window")]
    pub snap_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Candidates returned per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidates at or below this relevance are dropped
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Candidates placed into the generation context
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,

    /// Append clinical synonyms to the question before embedding
    #[serde(default = "default_true")]
    pub query_expansion: bool,

    /// Drop administrative front-matter chunks
    #[serde(default)]
    pub boilerplate_filter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Deterministic concatenation of approved sections
    #[default]
    Structured,
    /// Generated executive prose over approved content
    Prose,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Sections extracted at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-section timeout in seconds
    #[serde(default = "default_section_timeout")]
    pub section_timeout_secs: u64,

    /// Whole-sweep timeout in seconds
    #[serde(default = "default_sweep_timeout")]
    pub sweep_timeout_secs: u64,

    /// Summary rendering mode
    #[serde(default)]
    pub summary_mode: SummaryMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_embedding_provider() -> String { "ollama".to_string() }
fn default_embedding_model() -> String { "nomic-embed-text".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 120 }
fn default_batch_size() -> usize { 16 }
fn default_generation_provider() -> String { "ollama".to_string() }
fn default_generation_model() -> String { "llama3.1:latest".to_string() }
fn default_quick_timeout() -> u64 { 20 }
fn default_reading_timeout() -> u64 { 45 }
fn default_summary_timeout() -> u64 { 45 }
fn default_warm_up_timeout() -> u64 { 60 }
fn default_index_backend() -> String { "memory".to_string() }
fn default_collection() -> String { "clinical_protocol".to_string() }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_snap_window() -> usize { 150 }
fn default_top_k() -> usize { 6 }
fn default_min_relevance() -> f32 { 0.2 }
fn default_max_context_chunks() -> usize { 4 }
fn default_true() -> bool { true }
fn default_max_concurrency() -> usize { 6 }
fn default_section_timeout() -> u64 { 240 }
fn default_sweep_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "protolens".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // e.g., PROTOLENS__RETRIEVAL__TOP_K=8
            .add_source(
                Environment::with_prefix("PROTOLENS")
                    .separator("__")
                    .try_parsing(true),
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("PROTOLENS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(AppError::Configuration {
                message: "retrieval.top_k must be greater than zero".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.retrieval.min_relevance) {
            return Err(AppError::Configuration {
                message: format!(
                    "retrieval.min_relevance must be in [0, 1), got {}",
                    self.retrieval.min_relevance
                ),
            });
        }
        if self.retrieval.max_context_chunks == 0 {
            return Err(AppError::Configuration {
                message: "retrieval.max_context_chunks must be greater than zero".to_string(),
            });
        }
        if self.extraction.max_concurrency == 0 {
            return Err(AppError::Configuration {
                message: "extraction.max_concurrency must be greater than zero".to_string(),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(AppError::Configuration {
                message: "embedding.dimension must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Configuration {
                message: "chunking.chunk_size must be greater than zero".to_string(),
            });
        }
        if self.overlap >= self.chunk_size {
            return Err(AppError::Configuration {
                message: format!(
                    "chunking.overlap ({}) must be smaller than chunk_size ({})",
                    self.overlap, self.chunk_size
                ),
            });
        }
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ExtractionConfig {
    pub fn section_timeout(&self) -> Duration {
        Duration::from_secs(self.section_timeout_secs)
    }

    pub fn sweep_timeout(&self) -> Duration {
        Duration::from_secs(self.sweep_timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_base: None,
            model: default_generation_model(),
            quick_timeout_secs: default_quick_timeout(),
            reading_timeout_secs: default_reading_timeout(),
            summary_timeout_secs: default_summary_timeout(),
            warm_up_timeout_secs: default_warm_up_timeout(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            database_url: None,
            collection: default_collection(),
            metric: DistanceMetric::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
            snap_window: default_snap_window(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevance: default_min_relevance(),
            max_context_chunks: default_max_context_chunks(),
            query_expansion: default_true(),
            boilerplate_filter: false,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            section_timeout_secs: default_section_timeout(),
            sweep_timeout_secs: default_sweep_timeout(),
            summary_mode: SummaryMode::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.index.metric, DistanceMetric::Cosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = AppConfig::default();
        config.chunking.overlap = 1000;
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_min_relevance_range() {
        let mut config = AppConfig::default();
        config.retrieval.min_relevance = 1.0;
        assert!(config.validate().is_err());
        config.retrieval.min_relevance = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.extraction.max_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
