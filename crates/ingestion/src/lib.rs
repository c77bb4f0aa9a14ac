//! ProtoLens Ingestion
//!
//! Turns a protocol PDF into indexed chunks:
//! 1. Extracts per-page text
//! 2. Segments pages into overlapping, sentence-aligned chunks
//! 3. Embeds the chunks as documents
//! 4. Replaces the collection contents under its write lock

pub mod chunker;
pub mod errors;
pub mod pdf;
pub mod processor;

pub use chunker::{segment, Segmenter};
pub use errors::IngestionError;
pub use pdf::{LopdfExtractor, PageExtractor};
pub use processor::{IngestionProcessor, IngestionReport};
