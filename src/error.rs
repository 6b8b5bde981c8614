//! Error types for the abaconvert library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during extraction, parsing and export.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading or writing CSV.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error parsing XML format.
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Text could not be extracted from a PDF document.
    #[error("PDF extraction error: {0}")]
    PdfError(String),

    /// A noise or scanning pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Unknown statement layout selector.
    #[error("Invalid statement layout: {0} (expected columnar/a, carried-balance/b, dash-marked/c)")]
    InvalidLayout(String),

    /// Invalid input format specified.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// General parsing error.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The document yielded no transactions at all.
    #[error("No transactions found in this document")]
    NoTransactions,
}

impl From<serde_xml_rs::Error> for Error {
    fn from(err: serde_xml_rs::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}
