//! In-memory vector index

use super::{DistanceMetric, IndexHit, IndexRecord, VectorIndex};
use crate::errors::{AppError, Result};
use crate::models::ChunkMetadata;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    dimension: Option<usize>,
    records: BTreeMap<String, (Vec<f32>, ChunkMetadata)>,
}

/// Brute-force index over a sorted map
///
/// Iteration order is by id, so equal distances come back in a stable order.
pub struct InMemoryIndex {
    metric: DistanceMetric,
    state: RwLock<State>,
}

impl InMemoryIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            state: RwLock::new(State::default()),
        }
    }
}

fn dimension_mismatch(expected: usize, actual: usize) -> AppError {
    AppError::VectorIndex {
        message: format!(
            "embedding dimension {} does not match collection dimension {}",
            actual, expected
        ),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut state = self.state.write().await;

        for record in records {
            let expected = *state.dimension.get_or_insert(record.embedding.len());
            if record.embedding.len() != expected {
                return Err(dimension_mismatch(expected, record.embedding.len()));
            }
            state
                .records
                .insert(record.id, (record.embedding, record.metadata));
        }

        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let state = self.state.read().await;

        if let Some(expected) = state.dimension {
            if expected != embedding.len() {
                return Err(dimension_mismatch(expected, embedding.len()));
            }
        }

        let mut hits: Vec<IndexHit> = state
            .records
            .iter()
            .map(|(id, (stored, metadata))| IndexHit {
                id: id.clone(),
                distance: self.metric.distance(embedding, stored),
                metadata: metadata.clone(),
            })
            .collect();

        // Stable sort keeps id order for equal distances
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().await.records.len())
    }

    async fn replace(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut fresh = State::default();
        for record in records {
            let expected = *fresh.dimension.get_or_insert(record.embedding.len());
            if record.embedding.len() != expected {
                return Err(dimension_mismatch(expected, record.embedding.len()));
            }
            fresh
                .records
                .insert(record.id, (record.embedding, record.metadata));
        }

        *self.state.write().await = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            embedding,
            metadata: ChunkMetadata {
                text: id.to_string(),
                page_number: 1,
                start_pos: 0,
                end_pos: id.len(),
                source_label: "Page 1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = InMemoryIndex::new(DistanceMetric::Cosine);
        index
            .upsert(vec![
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.1]),
                record("exact", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new(DistanceMetric::L2);
        index.upsert(vec![record("a", vec![0.0, 0.0])]).await.unwrap();
        index.upsert(vec![record("a", vec![3.0, 4.0])]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let hits = index.query(&[0.0, 0.0], 1).await.unwrap();
        assert!((hits[0].distance - 5.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryIndex::new(DistanceMetric::Cosine);
        index.upsert(vec![record("a", vec![1.0, 0.0])]).await.unwrap();
        assert!(index.query(&[1.0, 0.0, 0.0], 1).await.is_err());
        assert!(index.upsert(vec![record("b", vec![1.0])]).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_swaps_contents() {
        let index = InMemoryIndex::new(DistanceMetric::Cosine);
        index
            .upsert(vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        index
            .replace(vec![record("c", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_contents() {
        let index = InMemoryIndex::new(DistanceMetric::Cosine);
        index
            .upsert(vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        let result = index
            .replace(vec![record("c", vec![1.0, 0.0]), record("d", vec![1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 2);
        assert!(index.query(&[1.0, 0.0], 1).await.is_ok());
    }
}
