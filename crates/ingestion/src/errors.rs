//! Ingestion error types

use protolens_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("Document {0} contains no extractable text")]
    EmptyDocument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}
