//! Section extraction
//!
//! Runs the canonical question of each requested section through the
//! synthesizer on a bounded pool of tasks. Each section has its own timeout
//! and the sweep as a whole has a deadline; a section that misses either, or
//! whose task panics, comes back `Degraded` without affecting its siblings.

use crate::synthesizer::AnswerSynthesizer;
use protolens_common::config::ExtractionConfig;
use protolens_common::errors::{AppError, Result};
use protolens_common::models::{Answer, AnswerStatus, ExtractedSection, SectionType};
use protolens_common::scoring::extraction_confidence;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Sources listed per section
pub const MAX_SECTION_SOURCES: usize = 5;

/// Concurrent extractor over the fixed section catalogue
pub struct SectionExtractor {
    synthesizer: Arc<AnswerSynthesizer>,
    max_concurrency: usize,
    section_timeout: Duration,
    sweep_timeout: Duration,
}

impl SectionExtractor {
    pub fn new(synthesizer: Arc<AnswerSynthesizer>, config: &ExtractionConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(AppError::Configuration {
                message: "extraction.max_concurrency must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            synthesizer,
            max_concurrency: config.max_concurrency,
            section_timeout: config.section_timeout(),
            sweep_timeout: config.sweep_timeout(),
        })
    }

    pub fn with_timeouts(mut self, section_timeout: Duration, sweep_timeout: Duration) -> Self {
        self.section_timeout = section_timeout;
        self.sweep_timeout = sweep_timeout;
        self
    }

    /// Extract every section in `section_types`, returned in the same order
    #[instrument(skip(self, section_types), fields(sections = section_types.len(), max_concurrency = self.max_concurrency))]
    pub async fn extract_sections(&self, section_types: &[SectionType]) -> Vec<ExtractedSection> {
        let deadline = Instant::now() + self.sweep_timeout;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, &section) in section_types.iter().enumerate() {
            let synthesizer = Arc::clone(&self.synthesizer);
            let semaphore = Arc::clone(&semaphore);
            let section_timeout = self.section_timeout;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let answer =
                    tokio::time::timeout(section_timeout, synthesizer.answer(section.question()))
                        .await;
                (index, answer)
            });
        }

        let mut slots: Vec<Option<ExtractedSection>> = vec![None; section_types.len()];

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, Ok(answer))))) => {
                    slots[index] = Some(self.build_section(section_types[index], answer));
                }
                Ok(Some(Ok((index, Err(_))))) => {
                    let section = section_types[index];
                    warn!(
                        section = section.title(),
                        timeout_ms = self.section_timeout.as_millis() as u64,
                        "Section extraction timed out"
                    );
                    slots[index] = Some(degraded_section(
                        section,
                        &format!("timed out after {} ms", self.section_timeout.as_millis()),
                    ));
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Section extraction task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        sweep_ms = self.sweep_timeout.as_millis() as u64,
                        "Extraction sweep deadline reached"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let sections: Vec<ExtractedSection> = slots
            .into_iter()
            .zip(section_types)
            .map(|(slot, &section)| {
                slot.unwrap_or_else(|| degraded_section(section, "extraction did not complete"))
            })
            .collect();

        for section in &sections {
            protolens_common::metrics::record_section(section.title.title(), section.status.as_str());
        }
        info!(
            grounded = sections.iter().filter(|s| s.status == AnswerStatus::Grounded).count(),
            degraded = sections.iter().filter(|s| s.status == AnswerStatus::Degraded).count(),
            "Section extraction complete"
        );

        sections
    }

    fn build_section(&self, section: SectionType, answer: Answer) -> ExtractedSection {
        let content = match answer.status {
            AnswerStatus::Grounded | AnswerStatus::Fallback => {
                self.synthesizer.cleaner().clean_section(&answer.text)
            }
            _ => answer.text,
        };

        let mut sources = answer.sources;
        sources.truncate(MAX_SECTION_SOURCES);
        let evidence_count = answer.evidence.len();
        // Excerpt digests were never read by the model
        let confidence = match answer.status {
            AnswerStatus::Degraded => extraction_confidence(0, 0),
            _ => extraction_confidence(sources.len(), evidence_count),
        };

        ExtractedSection {
            title: section,
            description: section.description().to_string(),
            content,
            confidence,
            sources,
            evidence_count,
            approved: None,
            status: answer.status,
        }
    }
}

fn degraded_section(section: SectionType, reason: &str) -> ExtractedSection {
    ExtractedSection {
        title: section,
        description: section.description().to_string(),
        content: format!("{} could not be extracted: {}.", section.title(), reason),
        confidence: extraction_confidence(0, 0),
        sources: Vec::new(),
        evidence_count: 0,
        approved: None,
        status: AnswerStatus::Degraded,
    }
}
