//! Vector index abstraction
//!
//! Provides:
//! - The `VectorIndex` trait implemented by every backend
//! - An in-memory backend for tests and single-process runs
//! - A PostgreSQL/pgvector backend
//! - `Collection`, which gates readers against a running ingestion

mod memory;
mod pgvector;

pub use memory::InMemoryIndex;
pub use pgvector::PgVectorIndex;

use crate::config::IndexConfig;
use crate::errors::{AppError, Result};
use crate::models::ChunkMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Distance function a collection was created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`, in [0, 2]
    #[default]
    Cosine,
    /// Euclidean distance
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            other => Err(AppError::Configuration {
                message: format!("Unknown distance metric: {}", other),
            }),
        }
    }

    /// Distance between two vectors of equal length
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                (1.0 - dot / (norm_a * norm_b)).max(0.0)
            }
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

/// One stored record
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One query result, nearest first
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub distance: f32,
    pub metadata: ChunkMetadata,
}

/// Trait for vector storage backends
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Metric the collection was created with
    fn metric(&self) -> DistanceMetric;

    /// Insert or replace records by id
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()>;

    /// The `k` nearest records, ascending distance
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Swap the whole contents for `records`
    ///
    /// Either every record is stored or the previous contents are kept.
    async fn replace(&self, records: Vec<IndexRecord>) -> Result<()>;
}

/// A vector index plus the lock that serialises ingestion against retrieval
///
/// Cloning is cheap and every clone shares the same gate.
#[derive(Clone)]
pub struct Collection {
    name: String,
    index: Arc<dyn VectorIndex>,
    gate: Arc<RwLock<()>>,
}

/// Shared access for queries
pub struct CollectionReader<'a> {
    index: &'a dyn VectorIndex,
    _guard: RwLockReadGuard<'a, ()>,
}

/// Exclusive access for loading
pub struct CollectionWriter<'a> {
    index: &'a dyn VectorIndex,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl Collection {
    pub fn new(name: impl Into<String>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            name: name.into(),
            index,
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Collection backed by a fresh in-memory cosine index
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(InMemoryIndex::new(DistanceMetric::Cosine)))
    }

    /// Open the configured backend
    pub async fn open(config: &IndexConfig, dimension: usize) -> Result<Self> {
        let index: Arc<dyn VectorIndex> = match config.backend.as_str() {
            "memory" => Arc::new(InMemoryIndex::new(config.metric)),
            "pgvector" => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    AppError::Configuration {
                        message: "index.database_url is required for the pgvector backend"
                            .to_string(),
                    }
                })?;
                Arc::new(
                    PgVectorIndex::connect(url, &config.collection, config.metric, dimension)
                        .await?,
                )
            }
            other => {
                return Err(AppError::Configuration {
                    message: format!("Unknown index backend: {}", other),
                })
            }
        };
        Ok(Self::new(config.collection.clone(), index))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    /// Wait until no ingestion is running
    pub async fn read(&self) -> CollectionReader<'_> {
        CollectionReader {
            index: self.index.as_ref(),
            _guard: self.gate.read().await,
        }
    }

    /// Wait until every reader has finished
    pub async fn write(&self) -> CollectionWriter<'_> {
        CollectionWriter {
            index: self.index.as_ref(),
            _guard: self.gate.write().await,
        }
    }
}

impl CollectionReader<'_> {
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        self.index.query(embedding, k).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.index.count().await
    }
}

impl CollectionWriter<'_> {
    pub async fn replace(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.index.replace(records).await
    }

    pub async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.index.upsert(records).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.index.count().await
    }
}
