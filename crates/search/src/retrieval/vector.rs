//! Vector similarity retrieval
//!
//! Embeds the question with the query role, takes the nearest chunks from the
//! collection and maps cosine distance to relevance.

use super::{expand_query, is_administrative, Retriever};
use protolens_common::config::RetrievalConfig;
use protolens_common::embeddings::{Embedder, EmbeddingRole};
use protolens_common::errors::{AppError, Result};
use protolens_common::index::{Collection, DistanceMetric};
use protolens_common::models::{Chunk, RetrievalCandidate};
use protolens_common::retry::retry_once_on_timeout;
use protolens_common::scoring::relevance_from_distance;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Vector retriever over a cosine collection
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    collection: Collection,
    config: RetrievalConfig,
}

impl VectorRetriever {
    /// Create a new vector retriever
    ///
    /// Relevance is only meaningful for cosine distance, so any other metric
    /// is a configuration error.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        collection: Collection,
        config: RetrievalConfig,
    ) -> Result<Self> {
        if collection.metric() != DistanceMetric::Cosine {
            return Err(AppError::Configuration {
                message: format!(
                    "collection {} uses {} distance; retrieval requires cosine",
                    collection.name(),
                    collection.metric().as_str()
                ),
            });
        }
        if config.top_k == 0 {
            return Err(AppError::Configuration {
                message: "retrieval.top_k must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            embedder,
            collection,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn fetch_count(&self) -> usize {
        if self.config.boilerplate_filter {
            self.config.top_k * 2
        } else {
            self.config.top_k
        }
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    #[instrument(skip(self), fields(top_k = self.config.top_k))]
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievalCandidate>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation {
                message: "question must not be empty".to_string(),
            });
        }

        let start = Instant::now();

        let query = if self.config.query_expansion {
            expand_query(question)
        } else {
            question.to_string()
        };

        let embedding = retry_once_on_timeout("embed_query", || {
            self.embedder.embed(&query, EmbeddingRole::Query)
        })
        .await?;

        let hits = {
            let reader = self.collection.read().await;
            reader.query(&embedding, self.fetch_count()).await?
        };
        let fetched = hits.len();

        let mut candidates: Vec<RetrievalCandidate> = hits
            .into_iter()
            .map(|hit| RetrievalCandidate {
                relevance: relevance_from_distance(hit.distance),
                distance: hit.distance,
                chunk: Chunk::from_metadata(hit.id, hit.metadata),
            })
            .filter(|c| c.relevance > self.config.min_relevance)
            .filter(|c| !self.config.boilerplate_filter || !is_administrative(&c.chunk.text))
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.chunk.position().cmp(&b.chunk.position()))
        });
        candidates.truncate(self.config.top_k);

        protolens_common::metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            candidates.len(),
        );
        debug!(
            fetched,
            returned = candidates.len(),
            expanded = query.len() != question.len(),
            "Retrieval complete"
        );

        Ok(candidates)
    }

    async fn document_count(&self) -> Result<usize> {
        self.collection.read().await.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use protolens_common::embeddings::MockEmbedder;
    use protolens_common::index::{InMemoryIndex, IndexRecord};
    use protolens_common::models::ChunkMetadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn metadata(text: &str, page: u32, start: usize) -> ChunkMetadata {
        ChunkMetadata {
            text: text.to_string(),
            page_number: page,
            start_pos: start,
            end_pos: start + text.chars().count(),
            source_label: format!("Page {}", page),
        }
    }

    /// Every query embeds to the unit x-axis
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, _text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "axis"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Times out on the first call only
    struct SlowOnceEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for SlowOnceEmbedder {
        async fn embed(&self, _text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::EmbeddingTimeout { timeout_ms: 120_000 })
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn model_name(&self) -> &str {
            "slow-once"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Unit vector at `degrees` from the x-axis
    fn at_angle(degrees: f32) -> Vec<f32> {
        let radians = degrees.to_radians();
        vec![radians.cos(), radians.sin()]
    }

    async fn collection_with<S: Into<String>>(records: Vec<(S, Vec<f32>, ChunkMetadata)>) -> Collection {
        let collection = Collection::in_memory("test");
        let writer = collection.write().await;
        writer
            .upsert(
                records
                    .into_iter()
                    .map(|(id, embedding, metadata)| IndexRecord {
                        id: id.into(),
                        embedding,
                        metadata,
                    })
                    .collect(),
            )
            .await
            .unwrap();
        drop(writer);
        collection
    }

    fn config(top_k: usize) -> RetrievalConfig {
        RetrievalConfig {
            top_k,
            query_expansion: false,
            ..RetrievalConfig::default()
        }
    }

    #[tokio::test]
    async fn test_relevance_filter_and_order() {
        // cos 0 -> d 0, cos 60 -> d 0.5, cos 90 -> d 1.0 (relevance 0.167 < 0.2)
        let collection = collection_with(vec![
            ("chunk_0", at_angle(60.0), metadata("sixty degrees", 1, 0)),
            ("chunk_1", at_angle(0.0), metadata("aligned", 2, 0)),
            ("chunk_2", at_angle(90.0), metadata("orthogonal", 3, 0)),
        ])
        .await;

        let retriever = VectorRetriever::new(Arc::new(AxisEmbedder), collection, config(6)).unwrap();
        let candidates = retriever.retrieve("anything").await.unwrap();

        let ids: Vec<&str> = candidates.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_1", "chunk_0"]);
        assert!((candidates[0].relevance - 1.0).abs() < 1e-5);
        assert!((candidates[1].relevance - 0.5833).abs() < 1e-3);
        for c in &candidates {
            assert!(c.relevance > 0.2 && c.relevance <= 1.0);
        }
    }

    #[tokio::test]
    async fn test_ties_follow_document_order() {
        let collection = collection_with(vec![
            ("chunk_9", at_angle(10.0), metadata("later page", 4, 0)),
            ("chunk_1", at_angle(10.0), metadata("earlier page", 2, 300)),
            ("chunk_0", at_angle(10.0), metadata("earliest offset", 2, 0)),
        ])
        .await;

        let retriever = VectorRetriever::new(Arc::new(AxisEmbedder), collection, config(6)).unwrap();
        let pages: Vec<(u32, usize)> = retriever
            .retrieve("q")
            .await
            .unwrap()
            .iter()
            .map(|c| c.chunk.position())
            .collect();
        assert_eq!(pages, vec![(2, 0), (2, 300), (4, 0)]);
    }

    #[tokio::test]
    async fn test_top_k_limits_results() {
        let records = (0..10)
            .map(|i| {
                (
                    format!("chunk_{}", i),
                    at_angle(i as f32),
                    metadata("clinical text", 1, i * 10),
                )
            })
            .collect();
        let collection = collection_with(records).await;

        let retriever = VectorRetriever::new(Arc::new(AxisEmbedder), collection, config(3)).unwrap();
        assert_eq!(retriever.retrieve("q").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let collection = collection_with(vec![(
            "chunk_0",
            at_angle(120.0),
            metadata("unrelated", 1, 0),
        )])
        .await;

        let retriever = VectorRetriever::new(Arc::new(AxisEmbedder), collection, config(6)).unwrap();
        assert!(retriever.retrieve("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_boilerplate_filter_fetches_extra() {
        let signature = "SIGNATURE PAGE. The investigator acknowledges the protocol and agrees.";
        let clinical = "Adults aged 18 to 65 years with type 2 diabetes are eligible to enroll.";
        let collection = collection_with(vec![
            ("chunk_0", at_angle(0.0), metadata(signature, 1, 0)),
            ("chunk_1", at_angle(5.0), metadata(clinical, 5, 0)),
        ])
        .await;

        let retriever = VectorRetriever::new(
            Arc::new(AxisEmbedder),
            collection,
            RetrievalConfig {
                boilerplate_filter: true,
                ..config(1)
            },
        )
        .unwrap();

        let candidates = retriever.retrieve("who can enroll").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].chunk.id, "chunk_1");
    }

    #[tokio::test]
    async fn test_embedding_timeout_retried_once() {
        let collection = collection_with(vec![("chunk_0", at_angle(0.0), metadata("aligned", 1, 0))]).await;
        let embedder = Arc::new(SlowOnceEmbedder {
            calls: AtomicUsize::new(0),
        });

        let retriever = VectorRetriever::new(embedder.clone(), collection, config(6)).unwrap();
        assert_eq!(retriever.retrieve("q").await.unwrap().len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mock_embedder_finds_matching_chunk() {
        let embedder = Arc::new(MockEmbedder::new(256));
        let texts = [
            "Inclusion criteria: adults aged 18 to 65 with type 2 diabetes.",
            "The sponsor will archive records for fifteen years.",
        ];
        let mut records = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let embedding = embedder.embed(text, EmbeddingRole::Document).await.unwrap();
            records.push((if i == 0 { "chunk_0" } else { "chunk_1" }, embedding, metadata(text, 1, i * 100)));
        }
        let collection = collection_with(records).await;

        let retriever = VectorRetriever::new(
            embedder,
            collection,
            RetrievalConfig {
                min_relevance: 0.0,
                ..config(1)
            },
        )
        .unwrap();
        let candidates = retriever.retrieve("inclusion criteria").await.unwrap();
        assert_eq!(candidates[0].chunk.id, "chunk_0");
    }

    #[tokio::test]
    async fn test_non_cosine_collection_rejected() {
        let collection = Collection::new("l2", Arc::new(InMemoryIndex::new(DistanceMetric::L2)));
        let result = VectorRetriever::new(Arc::new(AxisEmbedder), collection, config(6));
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let retriever =
            VectorRetriever::new(Arc::new(AxisEmbedder), Collection::in_memory("test"), config(6))
                .unwrap();
        let err = tokio_test::assert_err!(retriever.retrieve("   ").await);
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
