//! Text segmentation module
//!
//! Splits pages into overlapping character windows. Window ends are pulled
//! back to the start of a sentence when one begins near the end of the window.

use crate::errors::IngestionError;
use protolens_common::config::ChunkingConfig;
use protolens_common::models::{Chunk, Page};
use tracing::{debug, warn};

/// Splits pages into chunks with page and offset metadata
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: ChunkingConfig,
}

impl Segmenter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestionError> {
        config
            .validate()
            .map_err(|e| IngestionError::InvalidChunking(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Segment every page, numbering chunks across the whole document
    pub fn segment(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            self.segment_page(page, &mut chunks);
        }

        debug!(
            page_count = pages.len(),
            chunk_count = chunks.len(),
            chunk_size = self.config.chunk_size,
            overlap = self.config.overlap,
            "Document segmented"
        );

        chunks
    }

    fn segment_page(&self, page: &Page, out: &mut Vec<Chunk>) {
        let chars: Vec<char> = page.text.chars().collect();
        let total_len = chars.len();
        let source_label = Chunk::label_for_page(page.page_number);

        let mut start = 0;
        while start < total_len {
            let mut end = (start + self.config.chunk_size).min(total_len);

            if end < total_len {
                if let Some(boundary) = self.find_sentence_start(&chars, start, end) {
                    end = boundary;
                }
            }

            let window = &chars[start..end];
            if window.iter().any(|c| !c.is_whitespace()) {
                out.push(Chunk {
                    id: format!("chunk_{}", out.len()),
                    text: window.iter().collect(),
                    page_number: page.page_number,
                    start_pos: start,
                    end_pos: end,
                    source_label: source_label.clone(),
                });
            }

            if end >= total_len {
                break;
            }

            let next = end.saturating_sub(self.config.overlap);
            if next <= start {
                warn!(
                    page = page.page_number,
                    start, end, "Chunk start did not advance, stopping page"
                );
                break;
            }
            start = next;
        }
    }

    /// Last sentence start inside the snap window of `[start, end)`
    ///
    /// A sentence start is a capital letter preceded by whitespace that is in
    /// turn preceded by `.`, `!` or `?`. Candidates at or before
    /// `start + overlap` are rejected so the next window still advances.
    fn find_sentence_start(&self, chars: &[char], start: usize, end: usize) -> Option<usize> {
        let floor = (start + self.config.overlap).max(end.saturating_sub(self.config.snap_window));

        (floor + 1..end).rev().find(|&candidate| {
            if !chars[candidate].is_uppercase() {
                return false;
            }
            let mut cursor = candidate;
            while cursor > floor && chars[cursor - 1].is_whitespace() {
                cursor -= 1;
            }
            cursor < candidate && cursor > floor && matches!(chars[cursor - 1], '.' | '!' | '?')
        })
    }
}

/// Segment with the given window and overlap and the default snap window
pub fn segment(
    pages: &[Page],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, IngestionError> {
    let segmenter = Segmenter::new(ChunkingConfig {
        chunk_size,
        overlap,
        ..ChunkingConfig::default()
    })?;
    Ok(segmenter.segment(pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str =
        "The patient has diabetes. The treatment is insulin. The dosage is 10mg.";

    fn page(number: u32, text: &str) -> Page {
        Page::new(number, text)
    }

    fn slice(text: &str, start: usize, end: usize) -> String {
        text.chars().skip(start).take(end - start).collect()
    }

    #[test]
    fn test_sentence_snapping_scenario() {
        let chunks = segment(&[page(1, SCENARIO)], 30, 10).unwrap();

        let bounds: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_pos, c.end_pos)).collect();
        assert_eq!(bounds, vec![(0, 26), (16, 46), (36, 52), (42, 71)]);

        // Windows with a sentence start in reach end right after the punctuation
        assert_eq!(chunks[0].text, "The patient has diabetes. ");
        assert!(chunks[2].text.ends_with("insulin. "));
    }

    #[test]
    fn test_overlap_reconstructs_text() {
        let overlap = 10;
        let chunks = segment(&[page(1, SCENARIO)], 30, overlap).unwrap();

        let mut rebuilt = chunks[0].text.clone();
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_pos, pair[0].end_pos - overlap);
            rebuilt.extend(pair[1].text.chars().skip(overlap));
        }
        assert_eq!(rebuilt, SCENARIO);
    }

    #[test]
    fn test_chunk_text_matches_offsets() {
        let text = "Inclusion criteria. Adults aged 18 to 65! Signed consent? Yes. ".repeat(40);
        let chunks = segment(&[page(3, &text)], 120, 30).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.text, slice(&text, chunk.start_pos, chunk.end_pos));
            assert!(chunk.char_len() <= 120);
            assert_eq!(chunk.page_number, 3);
            assert_eq!(chunk.source_label, "Page 3");
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start_pos > pair[0].start_pos);
            assert_eq!(pair[1].start_pos, pair[0].end_pos - 30);
        }
    }

    #[test]
    fn test_chunks_never_cross_pages_and_ids_are_global() {
        let pages = vec![
            page(1, &"Alpha beta gamma. ".repeat(10)),
            page(2, &"Delta epsilon zeta. ".repeat(10)),
        ];
        let chunks = segment(&pages, 50, 10).unwrap();

        let page_one = chunks.iter().filter(|c| c.page_number == 1).count();
        assert!(page_one > 0 && page_one < chunks.len());
        for (n, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("chunk_{}", n));
            let source = &pages[(chunk.page_number - 1) as usize].text;
            assert!(chunk.end_pos <= source.chars().count());
        }
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let pages = vec![page(1, SCENARIO), page(2, &"Dose escalation. ".repeat(20))];
        let first = segment(&pages, 40, 8).unwrap();
        let second = segment(&pages, 40, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_page_yields_nothing() {
        let chunks = segment(&[page(1, "   \n\t  "), page(2, "")], 30, 10).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_page_is_one_chunk() {
        let chunks = segment(&[page(7, "Study drug: ABC-123.")], 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Study drug: ABC-123.");
        assert_eq!(chunks[0].source_label, "Page 7");
    }

    #[test]
    fn test_multibyte_offsets_are_characters() {
        let text = "Température ≥ 38 °C. Patients éligibles. ".repeat(5);
        let chunks = segment(&[page(1, &text)], 25, 5).unwrap();
        for chunk in &chunks {
            assert_eq!(chunk.text, slice(&text, chunk.start_pos, chunk.end_pos));
        }
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            segment(&[page(1, SCENARIO)], 10, 10),
            Err(IngestionError::InvalidChunking(_))
        ));
        assert!(segment(&[page(1, SCENARIO)], 0, 0).is_err());
    }
}
