//! Answer synthesis
//!
//! Turns a question into an `Answer`: retrieve candidates, build a
//! page-ordered context from the best of them, generate, clean, and fall back
//! to the top excerpt when the model output is unusable. When the model is
//! unreachable the answer is a digest of the excerpts instead. `answer` never
//! fails; every failure is expressed through `AnswerStatus`.

use crate::cleaning::{check_quality, ResponseCleaner};
use crate::digest::excerpt_digest;
use crate::prompt::reading_prompt;
use protolens_common::errors::{AppError, ErrorClass, Result};
use protolens_common::generation::{GenerationOptions, Generator};
use protolens_common::models::{Answer, AnswerStatus, Chunk, RetrievalCandidate};
use protolens_common::retry::retry_once_on_timeout;
use protolens_common::scoring::answer_confidence;
use protolens_search::Retriever;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Attempts before falling back to the top excerpt
const GENERATION_ATTEMPTS: usize = 2;

/// Grounded question answering over one collection
pub struct AnswerSynthesizer {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    options: GenerationOptions,
    max_context_chunks: usize,
    cleaner: ResponseCleaner,
}

impl AnswerSynthesizer {
    /// `options` is normally the reading preset with the configured timeout
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        options: GenerationOptions,
        max_context_chunks: usize,
    ) -> Result<Self> {
        if max_context_chunks == 0 {
            return Err(AppError::Configuration {
                message: "retrieval.max_context_chunks must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            retriever,
            generator,
            options,
            max_context_chunks,
            cleaner: ResponseCleaner::new()?,
        })
    }

    pub fn cleaner(&self) -> &ResponseCleaner {
        &self.cleaner
    }

    /// Answer one question
    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> Answer {
        let answer = self.answer_inner(question).await;

        protolens_common::metrics::record_answer(answer.status.as_str());
        info!(
            status = answer.status.as_str(),
            confidence = answer.confidence,
            sources = answer.sources.len(),
            "Question answered"
        );

        answer
    }

    async fn answer_inner(&self, question: &str) -> Answer {
        if question.trim().is_empty() {
            return Answer::no_grounding(question);
        }

        match self.retriever.document_count().await {
            Ok(0) => return Answer::no_documents(question),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not count indexed chunks");
                return Answer::degraded(question, e);
            }
        }

        let candidates = match self.retriever.retrieve(question).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                return Answer::degraded(question, e);
            }
        };

        let Some(top) = candidates
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .cloned()
        else {
            return Answer::no_grounding(question);
        };

        let context = select_context(&candidates, self.max_context_chunks);
        let prompt = reading_prompt(question, &context);
        let sources = dedup_labels(&context);
        let confidence = answer_confidence(top.distance);

        match self.generate_checked(&prompt).await {
            Ok(Some(text)) => Answer {
                question: question.to_string(),
                text,
                sources,
                evidence: candidates,
                confidence,
                status: AnswerStatus::Grounded,
            },
            Ok(None) => {
                info!(page = top.chunk.page_number, "Falling back to top excerpt");
                Answer {
                    question: question.to_string(),
                    text: top.chunk.text.trim().to_string(),
                    sources: vec![top.chunk.source_label.clone()],
                    evidence: candidates,
                    confidence,
                    status: AnswerStatus::Fallback,
                }
            }
            Err(e) => {
                warn!(error = %e, "Generation failed, answering from excerpts");
                let digest = excerpt_digest(question, &context, &e.to_string());
                Answer {
                    question: question.to_string(),
                    text: digest.text,
                    sources: digest.sources,
                    evidence: candidates,
                    confidence: 0.0,
                    status: AnswerStatus::Degraded,
                }
            }
        }
    }

    /// Cleaned output, or `None` when every attempt was low quality
    ///
    /// Timeouts are retried once inside each attempt. Gateway failures end
    /// the loop.
    async fn generate_checked(&self, prompt: &str) -> Result<Option<String>> {
        for attempt in 1..=GENERATION_ATTEMPTS {
            let outcome = retry_once_on_timeout("generate_answer", || {
                self.generator.generate(prompt, &self.options)
            })
            .await
            .and_then(|raw| {
                let text = self.cleaner.clean_answer(&raw);
                check_quality(&text).map(|_| text)
            });

            match outcome {
                Ok(text) => return Ok(Some(text)),
                Err(e) if e.class() == ErrorClass::LowQualityOutput => {
                    debug!(attempt, error = %e, "Discarding generated answer");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

/// The best `limit` candidates by relevance, in document order
fn select_context(candidates: &[RetrievalCandidate], limit: usize) -> Vec<&Chunk> {
    let mut best: Vec<&RetrievalCandidate> = candidates.iter().collect();
    best.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    best.truncate(limit);

    let mut context: Vec<&Chunk> = best.into_iter().map(|c| &c.chunk).collect();
    context.sort_by_key(|chunk| chunk.position());
    context
}

fn dedup_labels(context: &[&Chunk]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for chunk in context {
        if !labels.contains(&chunk.source_label) {
            labels.push(chunk.source_label.clone());
        }
    }
    labels
}
