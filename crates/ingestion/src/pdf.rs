//! PDF page extraction module
//!
//! Extracts per-page text from PDF files using lopdf.

use crate::errors::IngestionError;
use protolens_common::models::Page;
use lopdf::content::{Content, Operation};
use lopdf::Object;
use std::path::Path;
use tracing::{debug, warn};

/// Turns a document on disk into numbered pages
pub trait PageExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<Page>, IngestionError>;
}

/// lopdf-backed extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PageExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Page>, IngestionError> {
        extract_pages_from_pdf(path)
    }
}

/// Extract the text of every page, keeping page numbers stable
pub fn extract_pages_from_pdf(path: &Path) -> Result<Vec<Page>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let page_map = doc.get_pages();
    debug!(page_count = page_map.len(), "Extracting text from PDF");

    let mut pages = Vec::with_capacity(page_map.len());
    for (&page_num, &page_id) in page_map.iter() {
        let text = match extract_page_text(&doc, page_num, page_id) {
            Ok(text) => clean_text(&text),
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, keeping it empty");
                String::new()
            }
        };
        pages.push(Page::new(page_num, text));
    }

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(IngestionError::PdfParseError {
            path: path.display().to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    debug!(
        page_count = pages.len(),
        total_chars = pages.iter().map(|p| p.text.len()).sum::<usize>(),
        "Text extraction complete"
    );

    Ok(pages)
}

/// Text of one page
///
/// lopdf's extractor handles font encodings. Pages it rejects fall back to
/// walking the decoded content stream for text-showing operators.
fn extract_page_text(
    doc: &lopdf::Document,
    page_num: u32,
    page_id: lopdf::ObjectId,
) -> Result<String, lopdf::Error> {
    match doc.extract_text(&[page_num]) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        _ => {
            let raw = doc.get_page_content(page_id)?;
            let content = Content::decode(&raw)?;
            Ok(text_from_operations(&content.operations))
        }
    }
}

/// Concatenate the string operands of `Tj`, `TJ`, `'` and `"`, one space per text object
fn text_from_operations(operations: &[Operation]) -> String {
    let mut text = String::new();
    for op in operations {
        match op.operator.as_str() {
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    text.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            text.push_str(&String::from_utf8_lossy(bytes));
                        }
                    }
                }
            }
            "ET" => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Normalise whitespace and typographic quotes
///
/// Paragraph breaks survive as a single newline; every other whitespace run
/// becomes one space.
pub fn clean_text(text: &str) -> String {
    let normalized = text
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    normalized
        .split("\n\n")
        .map(|paragraph| paragraph.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
