//! Spreadsheet (CSV) export of reconstructed transactions.
//!
//! Columns are `Date, Description, Debit, Credit, Solde`, optionally
//! followed by `Basis`. Amounts are written with two decimals and the unused
//! side is left empty; display formatting is up to the spreadsheet.

use crate::amount::parse_amount;
use crate::error::{Error, Result};
use crate::types::{SignBasis, Transaction};
use csv::{ReaderBuilder, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{Read, Write};

const HEADER: [&str; 5] = ["Date", "Description", "Debit", "Credit", "Solde"];
const BASIS_HEADER: &str = "Basis";

/// A transaction list as a spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSheet {
    pub transactions: Vec<Transaction>,
    /// Add a `Basis` column telling how each side was decided.
    pub with_basis: bool,
}

/// One sheet row as read back.
#[derive(Debug, Deserialize)]
struct SheetRow {
    #[serde(rename = "Date", alias = "date")]
    date: String,
    #[serde(rename = "Description", alias = "description", default)]
    description: String,
    #[serde(rename = "Debit", alias = "debit", default)]
    debit: String,
    #[serde(rename = "Credit", alias = "credit", default)]
    credit: String,
    #[serde(rename = "Solde", alias = "solde", alias = "Balance")]
    solde: String,
    #[serde(rename = "Basis", alias = "basis", default)]
    basis: Option<String>,
}

impl TransactionSheet {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            with_basis: false,
        }
    }

    pub fn with_basis(mut self, with_basis: bool) -> Self {
        self.with_basis = with_basis;
        self
    }

    /// Write the sheet to any destination implementing `Write`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use abaconvert::csv_format::TransactionSheet;
    ///
    /// let sheet = TransactionSheet::new(Vec::new());
    /// let mut file = File::create("transactions.csv")?;
    /// sheet.write_to(&mut file)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut csv_writer = Writer::from_writer(writer);

        let mut header: Vec<&str> = HEADER.to_vec();
        if self.with_basis {
            header.push(BASIS_HEADER);
        }
        csv_writer.write_record(&header)?;

        for tx in &self.transactions {
            let mut record = vec![
                tx.date.clone(),
                tx.description.clone(),
                format_cell(tx.debit),
                format_cell(tx.credit),
                format!("{:.2}", tx.solde),
            ];
            if self.with_basis {
                record.push(tx.sign_basis.to_string());
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Read a sheet previously written by [`TransactionSheet::write_to`].
    ///
    /// Rows without a `Basis` column are tagged [`SignBasis::BalanceDelta`].
    pub fn from_read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let with_basis = csv_reader.headers()?.iter().any(|h| h.eq_ignore_ascii_case(BASIS_HEADER));

        let mut transactions = Vec::new();
        for result in csv_reader.deserialize() {
            let row: SheetRow = result?;
            if row.date.is_empty() {
                continue;
            }
            transactions.push(Self::parse_row(row)?);
        }

        Ok(Self {
            transactions,
            with_basis,
        })
    }

    fn parse_row(row: SheetRow) -> Result<Transaction> {
        let debit = parse_cell(&row.debit)?;
        let credit = parse_cell(&row.credit)?;
        if debit.is_some() && credit.is_some() {
            return Err(Error::ParseError(format!(
                "row {} has both a debit and a credit",
                row.date
            )));
        }

        let solde = parse_amount(&row.solde).ok_or_else(|| Error::InvalidAmount(row.solde.clone()))?;
        let sign_basis = match row.basis.as_deref().map(str::trim) {
            Some(basis) if !basis.is_empty() => basis.parse::<SignBasis>().map_err(Error::ParseError)?,
            _ => SignBasis::BalanceDelta,
        };

        Ok(Transaction {
            date: row.date,
            description: row.description,
            debit,
            credit,
            solde,
            sign_basis,
        })
    }
}

fn format_cell(value: Option<Decimal>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn parse_cell(cell: &str) -> Result<Option<Decimal>> {
    if cell.trim().is_empty() {
        return Ok(None);
    }
    parse_amount(cell)
        .map(Some)
        .ok_or_else(|| Error::InvalidAmount(cell.to_string()))
}
