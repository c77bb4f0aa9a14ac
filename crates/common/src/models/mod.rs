//! Domain model shared by ingestion, retrieval and extraction

mod answer;
mod chunk;
mod section;

pub use answer::{Answer, AnswerStatus, NO_DOCUMENTS_TEXT, NO_GROUNDING_TEXT};
pub use chunk::{Chunk, ChunkMetadata, Page, RetrievalCandidate};
pub use section::{ExtractedSection, SectionType, Summary};
