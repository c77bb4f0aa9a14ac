//! Semantic retrieval
//!
//! Provides:
//! - The `Retriever` trait consumed by answer synthesis
//! - `VectorRetriever`, which embeds the question and queries the collection
//! - Clinical query expansion and an administrative-content filter

mod boilerplate;
mod expansion;
mod vector;

pub use boilerplate::{has_admin_marker, is_administrative};
pub use expansion::expand_query;
pub use vector::VectorRetriever;

use protolens_common::errors::Result;
use protolens_common::models::RetrievalCandidate;

/// Common trait for retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Candidates for `question`, most relevant first
    ///
    /// An empty result is a normal outcome, not an error.
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievalCandidate>>;

    /// Number of chunks currently indexed
    async fn document_count(&self) -> Result<usize>;
}
