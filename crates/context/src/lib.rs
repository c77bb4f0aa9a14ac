//! ProtoLens Context Engine
//!
//! Grounded answers and structured extraction over an ingested protocol:
//! - `AnswerSynthesizer`: retrieval, context assembly, generation and fallback
//! - `SectionExtractor`: concurrent extraction of the section catalogue
//! - `SummaryAssembler`: executive summary over reviewer-approved sections
//! - `ProtocolAssistant`: one handle over ingestion and all of the above

pub mod assistant;
pub mod cleaning;
pub mod digest;
pub mod extractor;
pub mod prompt;
pub mod summary;
pub mod synthesizer;

pub use assistant::ProtocolAssistant;
pub use extractor::SectionExtractor;
pub use summary::SummaryAssembler;
pub use synthesizer::AnswerSynthesizer;
