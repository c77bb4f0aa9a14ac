//! Post-processing of model output
//!
//! Provides:
//! - Answer cleanup (echoed dialogue turns, meta-commentary, bullet glyphs)
//! - Section content tidying and length capping
//! - The low-quality check that triggers a regeneration

use protolens_common::errors::{AppError, Result};
use regex_lite::Regex;

/// Answers shorter than this are rejected
pub const MIN_ANSWER_CHARS: usize = 20;

/// Section content is capped at this many characters
pub const MAX_SECTION_CHARS: usize = 600;

/// A sentence end after this many characters is a good enough cut point
pub const MIN_SECTION_CUT: usize = 400;

const DIALOGUE_PREFIXES: [&str; 4] = ["Human:", "User:", "Question:", "Assistant:"];

const META_COMMENTARY: [&str; 5] = [
    r"(?im)^[ \t]*based on (?:the|these) (?:sections?|documents?|text|excerpts?),?\s*",
    r"(?im)^[ \t]*according to (?:the|these) (?:sections?|documents?|excerpts?),?\s*",
    r"(?im)^[ \t]*from what I (?:can see|read|understand),?\s*",
    r"(?im)^[ \t]*looking at (?:the|these) (?:sections?|documents?|excerpts?),?\s*",
    r"(?im)^[ \t]*the (?:document|protocol|text) (?:states|mentions|indicates|shows)(?: that)?,?\s*",
];

const SECTION_OPENER: &str =
    r"(?i)^(?:here's what i found|here is what i found|here are the|regarding your question|based on the protocol)[^:\n]*:\s*";

const SOURCE_NOTE: &str = r"(?is)\n\n\*[^*]*\bfrom\b[^*]*\*\s*$";

/// Compiled cleanup rules
#[derive(Debug, Clone)]
pub struct ResponseCleaner {
    meta_commentary: Vec<Regex>,
    section_opener: Regex,
    source_note: Regex,
    blank_lines: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Internal {
        message: format!("invalid cleanup pattern {}: {}", pattern, e),
    })
}

impl ResponseCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            meta_commentary: META_COMMENTARY
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_>>()?,
            section_opener: compile(SECTION_OPENER)?,
            source_note: compile(SOURCE_NOTE)?,
            blank_lines: compile(r"\n{3,}")?,
        })
    }

    /// Clean a generated answer
    pub fn clean_answer(&self, raw: &str) -> String {
        let kept: Vec<&str> = raw
            .lines()
            .filter(|line| {
                let line = line.trim_start();
                !DIALOGUE_PREFIXES.iter().any(|p| line.starts_with(p))
            })
            .collect();
        let mut text = kept.join("\n");

        for pattern in &self.meta_commentary {
            text = pattern.replace_all(&text, "").into_owned();
        }

        text = text.replace(['•', '◦', '▪'], "-");
        text = self.blank_lines.replace_all(&text, "\n\n").into_owned();

        let text = capitalize_first(text.trim());
        terminate_sentence(text)
    }

    /// Tidy an answer for display as section content
    pub fn clean_section(&self, answer: &str) -> String {
        let text = self.section_opener.replace(answer.trim(), "");
        let text = self.source_note.replace(&text, "");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        truncate_section(capitalize_first(text.trim()))
    }
}

/// Reject output that is too short or is an error echo
pub fn check_quality(text: &str) -> Result<()> {
    let len = text.chars().count();
    if len < MIN_ANSWER_CHARS {
        return Err(AppError::LowQualityOutput {
            reason: format!("{} characters, need at least {}", len, MIN_ANSWER_CHARS),
        });
    }
    if text.starts_with("Error") {
        return Err(AppError::LowQualityOutput {
            reason: "output is an error message".to_string(),
        });
    }
    Ok(())
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
        _ => text.to_string(),
    }
}

fn terminate_sentence(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

/// Cap at `MAX_SECTION_CHARS`, preferring the last full stop past `MIN_SECTION_CUT`
fn truncate_section(text: String) -> String {
    if text.chars().count() <= MAX_SECTION_CHARS {
        return text;
    }

    let head: String = text.chars().take(MAX_SECTION_CHARS).collect();
    match head.char_indices().filter(|&(_, c)| c == '.').last() {
        Some((byte_idx, _)) if head[..byte_idx].chars().count() > MIN_SECTION_CUT => {
            head[..=byte_idx].to_string()
        }
        _ => format!("{}...", head.trim_end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> ResponseCleaner {
        ResponseCleaner::new().unwrap()
    }

    #[test]
    fn test_dialogue_turns_removed() {
        let raw = "The starting dose is 10 mg daily\nHuman: what about week 2?\n  Assistant: sure";
        assert_eq!(cleaner().clean_answer(raw), "The starting dose is 10 mg daily.");
    }

    #[test]
    fn test_meta_commentary_stripped() {
        let raw = "Based on the sections, the study enrolls adults aged 18 to 65.";
        assert_eq!(
            cleaner().clean_answer(raw),
            "The study enrolls adults aged 18 to 65."
        );

        let raw = "The protocol states that, visits occur every 4 weeks!";
        assert_eq!(cleaner().clean_answer(raw), "Visits occur every 4 weeks!");

        let raw = "Dose levels:\nAccording to the excerpts, cohorts start at 10 mg";
        assert_eq!(
            cleaner().clean_answer(raw),
            "Dose levels:\ncohorts start at 10 mg."
        );
    }

    #[test]
    fn test_meta_phrases_inside_sentences_kept() {
        let raw = "Dosing stops if the protocol indicates grade 3 toxicity, based on the sections reviewed by the committee.";
        assert_eq!(cleaner().clean_answer(raw), raw);
    }

    #[test]
    fn test_bullets_and_blank_lines() {
        let raw = "Exclusions:\n• pregnancy\n\n\n\n◦ renal failure\n▪ prior insulin use";
        assert_eq!(
            cleaner().clean_answer(raw),
            "Exclusions:\n- pregnancy\n\n- renal failure\n- prior insulin use."
        );
    }

    #[test]
    fn test_quality_check() {
        assert!(check_quality("Ready.").is_err());
        assert!(check_quality("Error: model not loaded on the server").is_err());
        assert!(check_quality("The primary endpoint is HbA1c at week 24.").is_ok());
        assert!(matches!(
            check_quality(""),
            Err(AppError::LowQualityOutput { .. })
        ));
    }

    #[test]
    fn test_section_opener_and_source_note() {
        let raw = "Here's what I found about the study drug:\n\nABC-123 is an oral tablet.\n\n*Information taken from pages 3 and 4*";
        assert_eq!(cleaner().clean_section(raw), "ABC-123 is an oral tablet.");
    }

    #[test]
    fn test_section_cut_at_sentence_end() {
        let sentence = "Participants attend a screening visit and a baseline visit. ";
        let raw = sentence.repeat(15);
        let content = cleaner().clean_section(&raw);

        assert!(content.chars().count() <= MAX_SECTION_CHARS);
        assert!(content.chars().count() > MIN_SECTION_CUT);
        assert!(content.ends_with("visit."));
    }

    #[test]
    fn test_section_cut_without_sentence_end() {
        let raw = format!("Criteria. {}", "x".repeat(700));
        let content = cleaner().clean_section(&raw);
        assert!(content.ends_with("..."));
        assert_eq!(content.chars().count(), MAX_SECTION_CHARS + 3);
    }

    #[test]
    fn test_short_section_untouched() {
        let raw = "Adults aged 18 to 65 with type 2 diabetes.";
        assert_eq!(cleaner().clean_section(raw), raw);
    }
}
