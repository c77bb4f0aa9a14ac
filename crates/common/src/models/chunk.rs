//! Pages, chunks and retrieval candidates

use serde::{Deserialize, Serialize};

/// One page of extracted document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// A contiguous slice of one page's text
///
/// `start_pos` and `end_pos` are character offsets into the page text, so
/// `text` always equals the page's characters `[start_pos, end_pos)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub page_number: u32,
    pub start_pos: usize,
    pub end_pos: usize,
    pub source_label: String,
}

/// Everything the vector index stores next to an embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub text: String,
    pub page_number: u32,
    pub start_pos: usize,
    pub end_pos: usize,
    pub source_label: String,
}

impl Chunk {
    /// Label shown to readers for chunks of the given page
    pub fn label_for_page(page_number: u32) -> String {
        format!("Page {}", page_number)
    }

    /// Split into the id and the stored metadata
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            text: self.text.clone(),
            page_number: self.page_number,
            start_pos: self.start_pos,
            end_pos: self.end_pos,
            source_label: self.source_label.clone(),
        }
    }

    /// Rebuild a chunk from an index record
    pub fn from_metadata(id: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            text: metadata.text,
            page_number: metadata.page_number,
            start_pos: metadata.start_pos,
            end_pos: metadata.end_pos,
            source_label: metadata.source_label,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.end_pos - self.start_pos
    }

    /// Document order: page first, then offset within the page
    pub fn position(&self) -> (u32, usize) {
        (self.page_number, self.start_pos)
    }
}

/// A chunk returned by the retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk: Chunk,
    /// Raw cosine distance from the index
    pub distance: f32,
    /// Distance mapped into [0, 1], higher is better
    pub relevance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip_keeps_id() {
        let chunk = Chunk {
            id: "chunk_3".to_string(),
            text: "Inclusion criteria".to_string(),
            page_number: 4,
            start_pos: 10,
            end_pos: 28,
            source_label: Chunk::label_for_page(4),
        };

        let rebuilt = Chunk::from_metadata("chunk_3", chunk.metadata());
        assert_eq!(rebuilt, chunk);
        assert_eq!(rebuilt.source_label, "Page 4");
        assert_eq!(rebuilt.char_len(), 18);
    }
}
