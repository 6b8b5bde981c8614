//! Columnar statement layout.
//!
//! Each record's first line reads
//!
//! ```text
//! 01.03.2024  PAYMENT ABC              56.05        1'234.56
//! ```
//!
//! with an optional value date and currency code in between. The last amount
//! on the line is the balance and the one before it the transaction amount.
//! Dates and currency codes are blanked out with spaces of the same width
//! so that byte offsets into the line keep pointing at the same columns.

use super::{clean_description, compile_phrases, Assembler, ParseOutcome, StatementLayout, StatementParser};
use crate::amount::{amount_tokens, signed_token_value, to_decimal};
use crate::segment::{date_re, segment, NoiseFilter, SegmentRules, TransactionBlock};
use crate::sign::resolve_by_delta;
use crate::types::Transaction;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

const MIN_DESCRIPTION_LEN: usize = 2;

const BOILERPLATE: &[&str] = &[
    r"(?i)\bvaleur\b",
    r"(?i)\bvaluta\b",
    r"(?i)\bcours\s+de\s+change\b",
    r"(?i)\bno\.?\s+de\s+transaction\b",
];

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(CHF|EUR|USD|GBP|JPY|CAD|AUD|SEK|NOK|DKK|PLN|CZK)(?:\b|\d)")
            .expect("currency regex")
    })
}

fn boilerplate() -> &'static [Regex] {
    static PHRASES: OnceLock<Vec<Regex>> = OnceLock::new();
    PHRASES.get_or_init(|| compile_phrases(BOILERPLATE))
}

/// Blank every date and currency code, keeping the line's byte length.
pub(crate) fn mask_columns(line: &str) -> String {
    let mut masked = line.to_string();
    let spans = date_re()
        .find_iter(line)
        .map(|m| m.range())
        .chain(currency_re().captures_iter(line).filter_map(|c| c.get(1)).map(|m| m.range()));
    for span in spans {
        masked.replace_range(span.clone(), &" ".repeat(span.len()));
    }
    masked
}

/// Fields read from one block before the side is known.
#[derive(Debug, Clone, PartialEq)]
struct ColumnarRecord {
    date: String,
    description: String,
    /// Zero when only the balance was printed.
    amount: Decimal,
    balance: Decimal,
}

/// Parser for the columnar layout.
#[derive(Debug, Clone)]
pub struct ColumnarParser {
    noise: NoiseFilter,
}

impl Default for ColumnarParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnarParser {
    pub fn new() -> Self {
        Self::with_noise(StatementLayout::Columnar.default_noise())
    }

    pub fn with_noise(noise: NoiseFilter) -> Self {
        Self { noise }
    }

    fn extract(block: &TransactionBlock) -> Result<ColumnarRecord, &'static str> {
        let date = block.date().ok_or("no leading date")?;
        let masked = mask_columns(block.first_line());

        let amounts = amount_tokens(&masked);
        let balance = amounts.last().ok_or("no amount on the date line")?;
        let (amount, description_end) = match amounts.len() {
            // A glued minus belongs to the balance, not the description.
            1 => (Decimal::ZERO, masked[..balance.start()].trim_end_matches(['-', '–']).len()),
            n => {
                let amount = &amounts[n - 2];
                (to_decimal(amount.as_str()), amount.start())
            }
        };

        let mut raw = masked.get(date.len()..description_end).unwrap_or_default().to_string();
        for line in block.continuation() {
            raw.push(' ');
            raw.push_str(line);
        }
        let description = clean_description(&raw, boilerplate());
        if description.chars().count() < MIN_DESCRIPTION_LEN {
            return Err("description too short");
        }

        Ok(ColumnarRecord {
            date: date.to_string(),
            description,
            amount,
            balance: signed_token_value(&masked, balance.start(), balance.end()),
        })
    }
}

impl StatementParser for ColumnarParser {
    fn layout(&self) -> StatementLayout {
        StatementLayout::Columnar
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let segmentation = segment(text, &self.noise, &SegmentRules::default());
        let mut assembler = Assembler::new(self.layout(), segmentation.diagnostics);
        let mut previous: Option<Decimal> = None;

        for block in &segmentation.blocks {
            let record = match Self::extract(block) {
                Ok(record) => record,
                Err(reason) => {
                    assembler.reject(block, reason);
                    continue;
                }
            };

            let resolution = resolve_by_delta(record.amount, record.balance, previous, &record.description);
            previous = Some(record.balance);

            match resolution {
                Some(r) => assembler.push(Transaction::posted(
                    record.date,
                    record.description,
                    r.side,
                    r.amount,
                    record.balance,
                    r.basis,
                )),
                None => assembler.reject(block, "zero amount"),
            }
        }

        assembler.finish()
    }
}
