//! PDF text extraction for statement import.
//!
//! The statement parsers expect one line per visual row, items separated by
//! single spaces, pages in reading order. `pdf-extract` gets close; the
//! normalization below takes care of the rest.

use crate::error::{Error, Result};
use std::path::Path;

/// Extract and normalize the text of a PDF held in memory.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::PdfError(format!("Failed to extract text from PDF: {}", e)))?;
    Ok(normalize_extracted_text(&raw))
}

/// Read a PDF file and extract its normalized text.
pub fn extract_text_from_path(path: impl AsRef<Path>) -> Result<String> {
    let bytes = std::fs::read(path.as_ref())?;
    log::debug!("read {} bytes from {}", bytes.len(), path.as_ref().display());
    extract_text(&bytes)
}

/// Bring extracted text to one trimmed, single-spaced line per row.
///
/// Form feeds (page breaks) become line breaks and empty lines are dropped.
pub fn normalize_extracted_text(raw: &str) -> String {
    raw.split(['\n', '\r', '\u{c}'])
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
