//! Executive summary assembly
//!
//! Only sections a reviewer approved are summarized. The structured body is
//! a pure function of those sections; prose mode asks the model to rewrite
//! them and falls back to the structured body on any failure.

use crate::cleaning::{check_quality, ResponseCleaner};
use crate::prompt::summary_prompt;
use protolens_common::config::SummaryMode;
use protolens_common::errors::{AppError, ErrorClass, Result};
use protolens_common::generation::{GenerationOptions, Generator};
use protolens_common::models::{ExtractedSection, Summary};
use protolens_common::retry::retry_once_on_timeout;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const SUMMARY_HEADER: &str = "# CLINICAL PROTOCOL EXECUTIVE SUMMARY";

const STRUCTURED_INTRO: &str =
    "This executive summary is based on the approved sections from the clinical protocol analysis.";

pub struct SummaryAssembler {
    generator: Arc<dyn Generator>,
    options: GenerationOptions,
    mode: SummaryMode,
    cleaner: ResponseCleaner,
}

impl SummaryAssembler {
    pub fn new(
        generator: Arc<dyn Generator>,
        options: GenerationOptions,
        mode: SummaryMode,
    ) -> Result<Self> {
        Ok(Self {
            generator,
            options,
            mode,
            cleaner: ResponseCleaner::new()?,
        })
    }

    pub fn mode(&self) -> SummaryMode {
        self.mode
    }

    /// Summarize the approved sections, in input order
    #[instrument(skip(self, sections), fields(sections = sections.len(), mode = ?self.mode))]
    pub async fn assemble(&self, sections: &[ExtractedSection]) -> Result<Summary> {
        let approved: Vec<&ExtractedSection> = sections.iter().filter(|s| s.is_approved()).collect();
        if approved.is_empty() {
            return Err(AppError::NoApprovedSections);
        }

        let summary = match self.mode {
            SummaryMode::Structured => structured(&approved),
            SummaryMode::Prose => match self.prose_body(&approved).await {
                Ok(body) => Summary {
                    body: format!("{}\n\n{}\n\n{}", SUMMARY_HEADER, body, footer(approved.len())),
                    section_count: approved.len(),
                    mode: SummaryMode::Prose,
                },
                Err(e) => {
                    warn!(error = %e, "Prose summary unavailable, using structured summary");
                    structured(&approved)
                }
            },
        };

        info!(
            section_count = summary.section_count,
            mode = ?summary.mode,
            "Executive summary assembled"
        );
        Ok(summary)
    }

    /// One generation plus at most one regeneration on low-quality output
    async fn prose_body(&self, approved: &[&ExtractedSection]) -> Result<String> {
        let prompt = summary_prompt(approved);
        let mut last_error = None;

        for attempt in 1..=2 {
            let outcome = retry_once_on_timeout("generate_summary", || {
                self.generator.generate(&prompt, &self.options)
            })
            .await
            .and_then(|raw| {
                let text = self.cleaner.clean_answer(&raw);
                check_quality(&text).map(|_| text)
            });

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if e.class() == ErrorClass::LowQualityOutput => {
                    debug!(attempt, error = %e, "Discarding generated summary");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(AppError::GenerationEmpty))
    }
}

fn footer(section_count: usize) -> String {
    let plural = if section_count == 1 { "" } else { "s" };
    format!("---\n*Generated from {} approved section{}*", section_count, plural)
}

/// Deterministic markdown over the approved sections
pub fn structured_body(approved: &[&ExtractedSection]) -> String {
    let mut body = format!("{}\n\n{}\n\n", SUMMARY_HEADER, STRUCTURED_INTRO);
    for section in approved {
        body.push_str("## ");
        body.push_str(&section.title.title().to_uppercase());
        body.push_str("\n\n");
        body.push_str(section.content.trim());
        body.push_str("\n\n");
    }
    body.push_str(&footer(approved.len()));
    body
}

fn structured(approved: &[&ExtractedSection]) -> Summary {
    Summary {
        body: structured_body(approved),
        section_count: approved.len(),
        mode: SummaryMode::Structured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolens_common::generation::MockGenerator;
    use protolens_common::models::{AnswerStatus, SectionType};

    fn section(title: SectionType, content: &str, approved: Option<bool>) -> ExtractedSection {
        ExtractedSection {
            title,
            description: title.description().to_string(),
            content: content.to_string(),
            confidence: 0.86,
            sources: vec!["Page 2".to_string()],
            evidence_count: 4,
            approved,
            status: AnswerStatus::Grounded,
        }
    }

    fn reviewed() -> Vec<ExtractedSection> {
        vec![
            section(SectionType::PrimaryObjective, "Assess HbA1c change at week 24.", Some(true)),
            section(SectionType::InclusionCriteria, "Adults aged 18 to 65.", Some(false)),
            section(SectionType::StudyDrug, "ABC-123 10 mg tablets.", Some(true)),
            section(SectionType::StudyEndpoints, "Not reviewed yet.", None),
        ]
    }

    fn assembler(generator: Arc<dyn Generator>, mode: SummaryMode) -> SummaryAssembler {
        SummaryAssembler::new(generator, GenerationOptions::summary(), mode).unwrap()
    }

    #[tokio::test]
    async fn test_structured_summary() {
        let generator = Arc::new(MockGenerator::fixed("unused"));
        let summary = tokio_test::assert_ok!(
            assembler(generator.clone(), SummaryMode::Structured)
                .assemble(&reviewed())
                .await
        );

        let expected = "# CLINICAL PROTOCOL EXECUTIVE SUMMARY\n\n\
            This executive summary is based on the approved sections from the clinical protocol analysis.\n\n\
            ## PRIMARY OBJECTIVE\n\nAssess HbA1c change at week 24.\n\n\
            ## STUDY DRUG\n\nABC-123 10 mg tablets.\n\n\
            ---\n*Generated from 2 approved sections*";
        assert_eq!(summary.body, expected);
        assert_eq!(summary.section_count, 2);
        assert_eq!(summary.mode, SummaryMode::Structured);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_structured_summary_is_deterministic() {
        let assembler = assembler(Arc::new(MockGenerator::fixed("unused")), SummaryMode::Structured);
        let first = assembler.assemble(&reviewed()).await.unwrap();
        let second = assembler.assemble(&reviewed()).await.unwrap();
        assert_eq!(first.body, second.body);
    }

    #[tokio::test]
    async fn test_no_approved_sections() {
        let sections = vec![
            section(SectionType::PrimaryObjective, "Objective.", Some(false)),
            section(SectionType::StudyDrug, "Drug.", None),
        ];
        let err = tokio_test::assert_err!(
            assembler(Arc::new(MockGenerator::fixed("unused")), SummaryMode::Structured)
                .assemble(&sections)
                .await
        );
        assert!(matches!(err, AppError::NoApprovedSections));

        let empty: Vec<ExtractedSection> = Vec::new();
        assert!(assembler(Arc::new(MockGenerator::fixed("unused")), SummaryMode::Prose)
            .assemble(&empty)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_prose_summary_uses_approved_content_only() {
        let generator = Arc::new(MockGenerator::new(|prompt| {
            assert!(prompt.contains("Assess HbA1c change at week 24."));
            assert!(!prompt.contains("Adults aged 18 to 65."));
            assert!(!prompt.contains("Not reviewed yet."));
            Ok("The study assesses HbA1c change at week 24 using ABC-123 10 mg tablets".to_string())
        }));
        let summary = assembler(generator, SummaryMode::Prose)
            .assemble(&reviewed())
            .await
            .unwrap();

        assert_eq!(summary.mode, SummaryMode::Prose);
        assert!(summary.body.starts_with(SUMMARY_HEADER));
        assert!(summary
            .body
            .contains("The study assesses HbA1c change at week 24 using ABC-123 10 mg tablets.\n\n---"));
        assert!(summary.body.ends_with("*Generated from 2 approved sections*"));
    }

    #[tokio::test]
    async fn test_prose_low_quality_falls_back_after_one_regeneration() {
        let generator = Arc::new(MockGenerator::fixed("Summary:"));
        let summary = assembler(generator.clone(), SummaryMode::Prose)
            .assemble(&reviewed())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 2);
        assert_eq!(summary.mode, SummaryMode::Structured);
        assert!(summary.body.contains("## STUDY DRUG"));
    }

    #[tokio::test]
    async fn test_prose_gateway_failure_falls_back() {
        let generator = Arc::new(MockGenerator::new(|_| {
            Err(AppError::GenerationUnavailable {
                message: "connection refused".to_string(),
            })
        }));
        let summary = assembler(generator.clone(), SummaryMode::Prose)
            .assemble(&reviewed())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(summary.mode, SummaryMode::Structured);
        assert_eq!(summary.section_count, 2);
    }
}
