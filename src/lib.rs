//! AbaConvert Library
//!
//! Reconstructs booked transactions from the text of bank statements and
//! exports them as a spreadsheet.
//!
//! # Supported Inputs
//!
//! - **PDF statements**: text is extracted with `pdf-extract`, then parsed
//! - **Plain text**: statement text extracted by some other tool
//! - **CAMT.054**: ISO 20022 debit/credit notifications (XML)
//!
//! Statement text comes in three layouts ([`StatementLayout`]): columnar,
//! carried balance and dash-marked. The layout must be given by the caller.
//!
//! # Examples
//!
//! ## Parsing a statement PDF
//!
//! ```no_run
//! use abaconvert::{pdf_text, parse_statement, StatementLayout};
//!
//! let text = pdf_text::extract_text_from_path("statement.pdf")?;
//! let outcome = parse_statement(&text, StatementLayout::CarriedBalance)?;
//! for tx in &outcome.transactions {
//!     println!("{} {} {}", tx.date, tx.description, tx.solde);
//! }
//! eprintln!("{}", outcome.diagnostics);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Exporting to CSV
//!
//! ```no_run
//! use std::fs::File;
//! use abaconvert::{parse_statement, StatementLayout};
//! use abaconvert::csv_format::TransactionSheet;
//!
//! let text = std::fs::read_to_string("statement.txt")?;
//! let outcome = parse_statement(&text, "c".parse::<StatementLayout>()?)?;
//!
//! let mut output = File::create("transactions.csv")?;
//! TransactionSheet::new(outcome.transactions).write_to(&mut output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod amount;
pub mod camt054_format;
pub mod csv_format;
pub mod error;
pub mod logging;
pub mod pdf_text;
pub mod segment;
pub mod sign;
pub mod statement;
pub mod types;

use std::str::FromStr;

// Re-export commonly used types
pub use error::{Error, Result};
pub use segment::NoiseFilter;
pub use statement::{check_balance_chain, parse_statement, BalanceBreak, ParseOutcome, StatementLayout, StatementParser};
pub use types::{DebitCredit, ParseDiagnostics, SignBasis, Transaction};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// PDF bank statement
    Pdf,
    /// Already extracted statement text
    Text,
    /// CAMT.054 ISO 20022 XML notification
    Camt054,
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(InputFormat::Pdf),
            "text" | "txt" => Ok(InputFormat::Text),
            "camt054" | "camt.054" | "camt" | "xml" => Ok(InputFormat::Camt054),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl InputFormat {
    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Pdf => "pdf",
            InputFormat::Text => "txt",
            InputFormat::Camt054 => "xml",
        }
    }

    /// Whether the input is statement text that needs a layout to parse.
    pub fn is_statement(&self) -> bool {
        matches!(self, InputFormat::Pdf | InputFormat::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("pdf".parse::<InputFormat>().unwrap(), InputFormat::Pdf);
        assert_eq!("PDF".parse::<InputFormat>().unwrap(), InputFormat::Pdf);
        assert_eq!("txt".parse::<InputFormat>().unwrap(), InputFormat::Text);
        assert_eq!("camt.054".parse::<InputFormat>().unwrap(), InputFormat::Camt054);
        assert!(matches!("mt940".parse::<InputFormat>(), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(InputFormat::Pdf.extension(), "pdf");
        assert_eq!(InputFormat::Text.extension(), "txt");
        assert_eq!(InputFormat::Camt054.extension(), "xml");
        assert!(!InputFormat::Camt054.is_statement());
    }
}
