//! Structured protocol sections and the executive summary

use serde::{Deserialize, Serialize};

use super::answer::AnswerStatus;
use crate::config::SummaryMode;

/// The fixed set of sections extracted from a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    PrimaryObjective,
    InclusionCriteria,
    ExclusionCriteria,
    StudyEndpoints,
    SafetyConsiderations,
    StudyDrug,
}

impl SectionType {
    /// Every section type in presentation order
    pub const ALL: [SectionType; 6] = [
        SectionType::PrimaryObjective,
        SectionType::InclusionCriteria,
        SectionType::ExclusionCriteria,
        SectionType::StudyEndpoints,
        SectionType::SafetyConsiderations,
        SectionType::StudyDrug,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionType::PrimaryObjective => "Primary Objective",
            SectionType::InclusionCriteria => "Inclusion Criteria",
            SectionType::ExclusionCriteria => "Exclusion Criteria",
            SectionType::StudyEndpoints => "Study Endpoints",
            SectionType::SafetyConsiderations => "Safety Considerations",
            SectionType::StudyDrug => "Study Drug",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SectionType::PrimaryObjective => "Main goal and purpose of the clinical trial",
            SectionType::InclusionCriteria => "Who can participate in this study",
            SectionType::ExclusionCriteria => "Who cannot participate in this study",
            SectionType::StudyEndpoints => "What the study is measuring",
            SectionType::SafetyConsiderations => "How patient safety is monitored",
            SectionType::StudyDrug => "Information about the investigational compound",
        }
    }

    /// The question asked of the synthesizer for this section
    pub fn question(&self) -> &'static str {
        match self {
            SectionType::PrimaryObjective => "What is the primary objective of this study?",
            SectionType::InclusionCriteria => "What are the inclusion criteria for participants?",
            SectionType::ExclusionCriteria => "What are the exclusion criteria for participants?",
            SectionType::StudyEndpoints => "What are the primary and secondary endpoints?",
            SectionType::SafetyConsiderations => "What safety measures are in place?",
            SectionType::StudyDrug => "What drug is being tested in this study?",
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// One extracted section awaiting review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSection {
    pub title: SectionType,
    pub description: String,
    pub content: String,
    /// Always within [0.70, 0.95]
    pub confidence: f32,
    pub sources: Vec<String>,
    pub evidence_count: usize,
    /// Set by the reviewer, never by extraction
    #[serde(default)]
    pub approved: Option<bool>,
    pub status: AnswerStatus,
}

impl ExtractedSection {
    pub fn is_approved(&self) -> bool {
        self.approved == Some(true)
    }
}

/// Executive summary over approved sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub body: String,
    pub section_count: usize,
    pub mode: SummaryMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_catalogue() {
        assert_eq!(SectionType::ALL.len(), 6);
        assert_eq!(SectionType::StudyDrug.title(), "Study Drug");
        assert!(SectionType::ALL
            .iter()
            .all(|s| s.question().ends_with('?')));
    }

    #[test]
    fn test_approved_defaults_to_none_when_missing() {
        let json = r#"{
            "title": "primary_objective",
            "description": "d",
            "content": "c",
            "confidence": 0.8,
            "sources": [],
            "evidence_count": 0,
            "status": "grounded"
        }"#;
        let section: ExtractedSection = serde_json::from_str(json).unwrap();
        assert_eq!(section.approved, None);
        assert!(!section.is_approved());
    }
}
