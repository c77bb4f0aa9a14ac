//! ProtoLens Search
//!
//! Turns a question into relevance-scored chunks from the active collection.

pub mod retrieval;

pub use retrieval::{Retriever, VectorRetriever};
