//! Answers produced by the synthesizer

use serde::{Deserialize, Serialize};

use super::chunk::RetrievalCandidate;

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Generated from retrieved context
    Grounded,
    /// Generation output was unusable, the top candidate's text is returned
    Fallback,
    /// Nothing relevant was retrieved
    NoGrounding,
    /// Nothing has been ingested
    NoDocuments,
    /// A gateway failed; the text explains what happened
    Degraded,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Grounded => "grounded",
            AnswerStatus::Fallback => "fallback",
            AnswerStatus::NoGrounding => "no_grounding",
            AnswerStatus::NoDocuments => "no_documents",
            AnswerStatus::Degraded => "degraded",
        }
    }
}

/// Answer to one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    /// Source labels of the chunks actually used, deduplicated
    pub sources: Vec<String>,
    /// Every candidate the retriever returned
    pub evidence: Vec<RetrievalCandidate>,
    pub confidence: f32,
    pub status: AnswerStatus,
}

pub const NO_GROUNDING_TEXT: &str =
    "I couldn't find relevant information about that in the protocol document.";

pub const NO_DOCUMENTS_TEXT: &str =
    "No protocol document has been ingested yet. Please ingest a PDF first.";

impl Answer {
    pub fn no_grounding(question: impl Into<String>) -> Self {
        Self::terminal(question, NO_GROUNDING_TEXT, AnswerStatus::NoGrounding)
    }

    pub fn no_documents(question: impl Into<String>) -> Self {
        Self::terminal(question, NO_DOCUMENTS_TEXT, AnswerStatus::NoDocuments)
    }

    pub fn degraded(question: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        let text = format!(
            "The answer could not be produced because a backing service failed: {}.",
            reason
        );
        Self::terminal(question, text, AnswerStatus::Degraded)
    }

    fn terminal(question: impl Into<String>, text: impl Into<String>, status: AnswerStatus) -> Self {
        Self {
            question: question.into(),
            text: text.into(),
            sources: Vec::new(),
            evidence: Vec::new(),
            confidence: 0.0,
            status,
        }
    }

    /// True when the answer carries retrieved content
    pub fn is_grounded(&self) -> bool {
        matches!(self.status, AnswerStatus::Grounded | AnswerStatus::Fallback)
    }
}
