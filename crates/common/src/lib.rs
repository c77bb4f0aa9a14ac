//! ProtoLens Common Library
//!
//! Shared code for the ProtoLens crates including:
//! - Domain model (pages, chunks, answers, sections)
//! - Embedding and generation gateway abstractions
//! - Vector index backends and the collection gate
//! - Relevance and confidence scoring
//! - Error types, retry policy and configuration
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod generation;
pub mod index;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod scoring;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::{Embedder, EmbeddingRole};
pub use errors::{AppError, ErrorClass, Result};
pub use generation::{GenerationOptions, Generator};
pub use index::{Collection, DistanceMetric, VectorIndex};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
