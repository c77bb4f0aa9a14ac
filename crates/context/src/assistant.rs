//! Protocol assistant
//!
//! Wires the gateways, the collection and the pipeline stages together from
//! one `AppConfig`.

use crate::extractor::SectionExtractor;
use crate::summary::SummaryAssembler;
use crate::synthesizer::AnswerSynthesizer;
use protolens_common::config::AppConfig;
use protolens_common::embeddings::{create_embedder, Embedder};
use protolens_common::errors::{AppError, Result};
use protolens_common::generation::{create_generator, warm_up, CallKind, Generator, WarmUpStatus};
use protolens_common::index::Collection;
use protolens_common::models::{Answer, ExtractedSection, Page, SectionType, Summary};
use protolens_ingestion::{
    IngestionError, IngestionProcessor, IngestionReport, LopdfExtractor, Segmenter,
};
use protolens_search::VectorRetriever;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Entry point for every protocol operation
pub struct ProtocolAssistant {
    collection: Collection,
    ingestion: IngestionProcessor,
    synthesizer: Arc<AnswerSynthesizer>,
    extractor: SectionExtractor,
    summary: SummaryAssembler,
    warm_up: WarmUpStatus,
}

impl ProtocolAssistant {
    /// Build from configuration and probe the generation model once
    ///
    /// An unavailable model is recorded in `warm_up_status` rather than
    /// failing start-up; later calls still go to the gateway with their own
    /// timeouts.
    pub async fn initialize(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let collection = Collection::open(&config.index, embedder.dimension()).await?;

        let status = warm_up(
            generator.as_ref(),
            &config.generation.options(CallKind::WarmUp),
        )
        .await;

        Self::from_parts(config, embedder, generator, collection, status)
    }

    /// Assemble from already-built gateways and collection
    pub fn from_parts(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        collection: Collection,
        warm_up: WarmUpStatus,
    ) -> Result<Self> {
        let segmenter = Segmenter::new(config.chunking).map_err(|e| AppError::Configuration {
            message: e.to_string(),
        })?;
        let ingestion = IngestionProcessor::new(
            Arc::new(LopdfExtractor),
            segmenter,
            Arc::clone(&embedder),
            collection.clone(),
            config.embedding.batch_size,
        );

        let retriever = VectorRetriever::new(embedder, collection.clone(), config.retrieval.clone())?;
        let synthesizer = Arc::new(AnswerSynthesizer::new(
            Arc::new(retriever),
            Arc::clone(&generator),
            config.generation.options(CallKind::Reading),
            config.retrieval.max_context_chunks,
        )?);
        let extractor = SectionExtractor::new(Arc::clone(&synthesizer), &config.extraction)?;
        let summary = SummaryAssembler::new(
            generator,
            config.generation.options(CallKind::Summary),
            config.extraction.summary_mode,
        )?;

        info!(
            collection = collection.name(),
            ready = warm_up.is_ready(),
            "Protocol assistant initialized"
        );

        Ok(Self {
            collection,
            ingestion,
            synthesizer,
            extractor,
            summary,
            warm_up,
        })
    }

    pub fn warm_up_status(&self) -> &WarmUpStatus {
        &self.warm_up
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Replace the collection with the contents of a PDF
    pub async fn ingest(&self, path: &Path) -> std::result::Result<IngestionReport, IngestionError> {
        self.ingestion.ingest_file(path).await
    }

    /// Replace the collection with already-extracted pages
    pub async fn ingest_pages(
        &self,
        source: &str,
        pages: &[Page],
    ) -> std::result::Result<IngestionReport, IngestionError> {
        self.ingestion.ingest_pages(source, pages).await
    }

    pub async fn ask(&self, question: &str) -> Answer {
        self.synthesizer.answer(question).await
    }

    pub async fn extract(&self, section_types: &[SectionType]) -> Vec<ExtractedSection> {
        self.extractor.extract_sections(section_types).await
    }

    /// Extract the full section catalogue
    pub async fn extract_all(&self) -> Vec<ExtractedSection> {
        self.extract(&SectionType::ALL).await
    }

    pub async fn summarize(&self, sections: &[ExtractedSection]) -> Result<Summary> {
        self.summary.assemble(sections).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolens_common::config::SummaryMode;
    use protolens_common::embeddings::MockEmbedder;
    use protolens_common::generation::MockGenerator;
    use protolens_common::models::AnswerStatus;

    fn protocol() -> Vec<Page> {
        vec![
            Page::new(
                1,
                "Protocol ABC-123. A randomized, double-blind study of ABC-123 in adults with type 2 diabetes.",
            ),
            Page::new(
                2,
                "Inclusion criteria. Adults aged 18 to 65 years with HbA1c between 7.0% and 10.5% may enroll.",
            ),
            Page::new(
                3,
                "Exclusion criteria. Pregnant or breastfeeding women and patients with renal failure are excluded.",
            ),
        ]
    }

    fn assistant(generator: Arc<dyn Generator>) -> ProtocolAssistant {
        let mut config = AppConfig::default();
        config.retrieval.min_relevance = 0.0;
        config.extraction.summary_mode = SummaryMode::Structured;
        ProtocolAssistant::from_parts(
            &config,
            Arc::new(MockEmbedder::new(256)),
            generator,
            Collection::in_memory("test"),
            WarmUpStatus::Ready { latency_ms: 1 },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_before_ingest() {
        let assistant = assistant(Arc::new(MockGenerator::echo_context()));
        let answer = assistant.ask("What are the inclusion criteria?").await;
        assert_eq!(answer.status, AnswerStatus::NoDocuments);
    }

    #[tokio::test]
    async fn test_ingest_then_ask() {
        let assistant = assistant(Arc::new(MockGenerator::echo_context()));
        let report = assistant.ingest_pages("protocol.pdf", &protocol()).await.unwrap();
        assert_eq!(report.page_count, 3);
        assert_eq!(report.chunk_count, 3);

        let answer = assistant.ask("What are the inclusion criteria?").await;
        assert_eq!(answer.status, AnswerStatus::Grounded);
        assert!(!answer.sources.is_empty());
        assert!(answer.confidence > 0.0 && answer.confidence <= 1.0);
        for source in &answer.sources {
            assert!(answer.evidence.iter().any(|c| &c.chunk.source_label == source));
        }
    }

    #[tokio::test]
    async fn test_extract_review_summarize() {
        let assistant = assistant(Arc::new(MockGenerator::echo_context()));
        assistant.ingest_pages("protocol.pdf", &protocol()).await.unwrap();

        let mut sections = assistant.extract_all().await;
        assert_eq!(sections.len(), 6);
        assert!(sections.iter().all(|s| s.approved.is_none()));
        assert!(tokio_test::assert_err!(assistant.summarize(&sections).await)
            .to_string()
            .contains("No approved sections"));

        sections[1].approved = Some(true);
        let summary = assistant.summarize(&sections).await.unwrap();
        assert_eq!(summary.section_count, 1);
        assert!(summary.body.contains("## INCLUSION CRITERIA"));
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_protocol() {
        let assistant = assistant(Arc::new(MockGenerator::echo_context()));
        assistant.ingest_pages("first.pdf", &protocol()).await.unwrap();
        assistant
            .ingest_pages("second.pdf", &[Page::new(1, "Study drug is insulin glargine.")])
            .await
            .unwrap();
        assert_eq!(assistant.collection().read().await.count().await.unwrap(), 1);
    }
}
