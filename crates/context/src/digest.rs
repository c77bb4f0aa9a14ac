//! Excerpt digests
//!
//! When the generation gateway fails after retrieval succeeded, the answer is
//! built from the retrieved excerpts instead: one matching sentence per
//! excerpt, picked with keywords chosen by the kind of question.

use protolens_common::models::Chunk;
use protolens_search::retrieval::has_admin_marker;

/// Sentences shorter than this are headings or fragments
const MIN_SENTENCE_CHARS: usize = 25;

/// Question words shorter than this are ignored for general questions
const MIN_KEYWORD_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionKind {
    Drug,
    Objective,
    Safety,
    Inclusion,
    Exclusion,
    Eligibility,
    General,
}

impl QuestionKind {
    fn classify(question: &str) -> Self {
        let lower = question.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["drug", "medication"]) {
            QuestionKind::Drug
        } else if has(&["objective", "purpose"]) {
            QuestionKind::Objective
        } else if has(&["safety"]) {
            QuestionKind::Safety
        } else if has(&["inclusion"]) {
            QuestionKind::Inclusion
        } else if has(&["exclusion"]) {
            QuestionKind::Exclusion
        } else if has(&["criteria", "eligib"]) {
            QuestionKind::Eligibility
        } else {
            QuestionKind::General
        }
    }

    fn lead(&self) -> &'static str {
        match self {
            QuestionKind::Drug => "Here is what the protocol says about the study drug:",
            QuestionKind::Objective => "Here are the main objectives and goals of this study:",
            QuestionKind::Safety => "Here is what the protocol says about safety in this study:",
            QuestionKind::Inclusion => {
                "Here are the key requirements for participants to join this study:"
            }
            QuestionKind::Exclusion => {
                "Participants cannot join this study if they meet these conditions:"
            }
            QuestionKind::Eligibility => "Here are the participant eligibility requirements:",
            QuestionKind::General => "Here is what the protocol excerpts say:",
        }
    }

    fn keywords(&self, question: &str) -> Vec<String> {
        let fixed: &[&str] = match self {
            QuestionKind::Drug => &["drug", "dose", "dosing", "mg", "tablet", "administered"],
            QuestionKind::Objective => {
                &["objective", "purpose", "endpoint", "determine", "evaluate", "assess"]
            }
            QuestionKind::Safety => &["safety", "adverse", "monitor", "risk", "toxicit"],
            QuestionKind::Inclusion | QuestionKind::Exclusion | QuestionKind::Eligibility => {
                &["criteria", "eligible", "must", "cannot", "aged", "exclude", "include", "enrol"]
            }
            QuestionKind::General => {
                return question
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
                    .map(str::to_lowercase)
                    .collect()
            }
        };
        fixed.iter().map(|w| w.to_string()).collect()
    }

    fn limit(&self) -> usize {
        match self {
            QuestionKind::Drug => 2,
            QuestionKind::Inclusion | QuestionKind::Exclusion | QuestionKind::Eligibility => 4,
            _ => 3,
        }
    }
}

/// Answer text built from excerpts, with the labels it quotes
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub text: String,
    pub sources: Vec<String>,
}

/// Digest `context` for `question`; `reason` is why the model was skipped
///
/// Falls back to quoting the first excerpt when no sentence matches.
pub fn excerpt_digest(question: &str, context: &[&Chunk], reason: &str) -> Digest {
    let kind = QuestionKind::classify(question);
    let keywords = kind.keywords(question);

    let mut sentences: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    for chunk in context {
        if sentences.len() == kind.limit() {
            break;
        }
        if let Some(sentence) = matching_sentence(&chunk.text, &keywords) {
            if !sentences.contains(&sentence) {
                sentences.push(sentence);
                if !sources.contains(&chunk.source_label) {
                    sources.push(chunk.source_label.clone());
                }
            }
        }
    }

    let body = if sentences.is_empty() {
        match context.first() {
            Some(chunk) => {
                sources.push(chunk.source_label.clone());
                chunk.text.trim().to_string()
            }
            None => return Digest {
                text: format!("The answer could not be produced: {}.", reason),
                sources,
            },
        }
    } else {
        sentences
            .iter()
            .map(|s| format!("{}.", s))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let text = format!(
        "{}\n\n{}\n\n*The model was unavailable ({}); quoted from {} of the protocol.*",
        kind.lead(),
        body,
        reason,
        sources.join(", ")
    );

    Digest { text, sources }
}

fn matching_sentence(text: &str, keywords: &[String]) -> Option<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS && !has_admin_marker(s))
        .find(|s| {
            let lower = s.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .map(str::to_string)
}
