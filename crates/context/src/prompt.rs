//! Prompt templates
//!
//! Every excerpt handed to the model is framed as a `[Source: LABEL]` block
//! followed by its text and a blank line.

use protolens_common::models::{Chunk, ExtractedSection};

fn push_block(prompt: &mut String, label: &str, text: &str) {
    prompt.push_str("[Source: ");
    prompt.push_str(label);
    prompt.push_str("]\n");
    prompt.push_str(text.trim());
    prompt.push_str("\n\n");
}

/// Prompt for answering one question from retrieved excerpts
pub fn reading_prompt(question: &str, context: &[&Chunk]) -> String {
    let mut prompt = String::from(
        "You are reading excerpts from a clinical trial protocol. \
         Answer the question using only the excerpts below. \
         Include specific details such as doses, ages, visit windows and timepoints when the excerpts give them. \
         If the excerpts do not contain the answer, say that the protocol excerpts do not cover it.\n\n",
    );

    for chunk in context {
        push_block(&mut prompt, &chunk.source_label, &chunk.text);
    }

    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt.push_str("\n\nAnswer:");
    prompt
}

/// Prompt for an executive summary over reviewed sections
pub fn summary_prompt(sections: &[&ExtractedSection]) -> String {
    let mut prompt = String::from(
        "You are preparing an executive summary of a clinical trial protocol for a study team. \
         Use only the approved sections below and do not add facts that are not in them. \
         Write a few concise paragraphs in a professional tone that cover each section.\n\n",
    );

    for section in sections {
        push_block(&mut prompt, section.title.title(), &section.content);
    }

    prompt.push_str("Executive summary:");
    prompt
}
