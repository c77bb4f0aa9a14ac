//! Ingestion processor
//!
//! Core logic for loading a protocol: page extraction, segmentation,
//! embedding, and replacing the collection's contents.

use crate::chunker::Segmenter;
use crate::errors::IngestionError;
use crate::pdf::PageExtractor;
use chrono::{DateTime, Utc};
use protolens_common::embeddings::{Embedder, EmbeddingRole};
use protolens_common::errors::AppError;
use protolens_common::index::{Collection, IndexRecord};
use protolens_common::models::{Chunk, Page};
use protolens_common::retry::retry_once_on_timeout;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Outcome of one ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    /// File name or caller-supplied label
    pub source: String,
    /// Hex SHA-256 of the source bytes, when ingested from a file
    pub sha256: Option<String>,
    pub page_count: usize,
    pub chunk_count: usize,
    pub collection: String,
    pub ingested_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Ingestion processor
pub struct IngestionProcessor {
    extractor: Arc<dyn PageExtractor>,
    segmenter: Segmenter,
    embedder: Arc<dyn Embedder>,
    collection: Collection,
    batch_size: usize,
}

impl IngestionProcessor {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        segmenter: Segmenter,
        embedder: Arc<dyn Embedder>,
        collection: Collection,
        batch_size: usize,
    ) -> Self {
        Self {
            extractor,
            segmenter,
            embedder,
            collection,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest a PDF from disk, replacing whatever the collection held
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestionReport, IngestionError> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let digest = hex::encode(Sha256::digest(&bytes));

        info!("Extracting pages from PDF...");
        let extractor = Arc::clone(&self.extractor);
        let owned_path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extractor.extract(&owned_path))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("PDF extraction task failed: {}", e),
            })??;

        let source = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut report = self.ingest_pages(&source, &pages).await?;
        report.sha256 = Some(digest);
        Ok(report)
    }

    /// Segment, embed and load already-extracted pages
    ///
    /// Embedding happens before the collection is locked and the contents
    /// are swapped in one step, so any failure leaves the previous protocol
    /// in place.
    #[instrument(skip(self, pages), fields(page_count = pages.len()))]
    pub async fn ingest_pages(
        &self,
        source: &str,
        pages: &[Page],
    ) -> Result<IngestionReport, IngestionError> {
        let start = Instant::now();

        let chunks = self.segmenter.segment(pages);
        if chunks.is_empty() {
            return Err(IngestionError::EmptyDocument(source.to_string()));
        }
        info!(chunk_count = chunks.len(), "Text segmented");

        let records = self.embed_chunks(&chunks).await?;

        self.collection.write().await.replace(records).await?;

        let duration = start.elapsed();
        protolens_common::metrics::record_ingestion(
            duration.as_secs_f64(),
            pages.len(),
            chunks.len(),
        );

        info!(
            chunk_count = chunks.len(),
            collection = self.collection.name(),
            duration_ms = duration.as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestionReport {
            source: source.to_string(),
            sha256: None,
            page_count: pages.len(),
            chunk_count: chunks.len(),
            collection: self.collection.name().to_string(),
            ingested_at: Utc::now(),
            duration_ms: duration.as_millis() as u64,
        })
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<IndexRecord>, IngestionError> {
        let mut records = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = retry_once_on_timeout("embed_documents", || {
                self.embedder.embed_batch(&texts, EmbeddingRole::Document)
            })
            .await?;

            if embeddings.len() != batch.len() {
                return Err(AppError::EmbeddingUnavailable {
                    message: format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        embeddings.len()
                    ),
                }
                .into());
            }

            records.extend(batch.iter().zip(embeddings).map(|(chunk, embedding)| {
                IndexRecord {
                    id: chunk.id.clone(),
                    embedding,
                    metadata: chunk.metadata(),
                }
            }));
        }

        Ok(records)
    }
}
