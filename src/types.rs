//! Common types shared by the statement parsers and the exporters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A transaction reconstructed from statement text.
///
/// At most one of `debit` and `credit` is set; `solde` is the account
/// balance right after the transaction was posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Booking date exactly as printed (`dd.mm.yyyy`).
    pub date: String,

    /// Whitespace-collapsed description, never empty.
    pub description: String,

    /// Money leaving the account.
    pub debit: Option<Decimal>,

    /// Money entering the account.
    pub credit: Option<Decimal>,

    /// Balance after this transaction.
    pub solde: Decimal,

    /// How the debit/credit side was decided.
    pub sign_basis: SignBasis,
}

impl Transaction {
    /// Build a transaction posting `amount` on `side`.
    pub fn posted(
        date: impl Into<String>,
        description: impl Into<String>,
        side: DebitCredit,
        amount: Decimal,
        solde: Decimal,
        sign_basis: SignBasis,
    ) -> Self {
        let amount = amount.abs();
        let (debit, credit) = match side {
            DebitCredit::Debit => (Some(amount), None),
            DebitCredit::Credit => (None, Some(amount)),
        };

        Self {
            date: date.into(),
            description: description.into(),
            debit,
            credit,
            solde,
            sign_basis,
        }
    }

    /// Side the amount was posted on.
    pub fn side(&self) -> DebitCredit {
        if self.credit.is_some() {
            DebitCredit::Credit
        } else {
            DebitCredit::Debit
        }
    }

    /// Signed movement: credit positive, debit negative.
    pub fn net_amount(&self) -> Decimal {
        self.credit.unwrap_or_default() - self.debit.unwrap_or_default()
    }

    /// True when the side was guessed rather than read or derived.
    pub fn is_heuristic(&self) -> bool {
        matches!(self.sign_basis, SignBasis::Keyword | SignBasis::Fallback)
    }
}

/// Debit/Credit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Debit transaction (outgoing).
    Debit,
    /// Credit transaction (incoming).
    Credit,
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "D" | "DBIT" | "DEBIT" => Ok(DebitCredit::Debit),
            "C" | "CRDT" | "CREDIT" => Ok(DebitCredit::Credit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

impl DebitCredit {
    /// Convert to ISO 20022 format.
    pub fn to_iso_format(&self) -> &'static str {
        match self {
            DebitCredit::Debit => "DBIT",
            DebitCredit::Credit => "CRDT",
        }
    }
}

/// Provenance of a transaction's debit/credit side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignBasis {
    /// Read from dash adjacency in the printed text.
    Dash,
    /// Derived from the delta between consecutive balances.
    BalanceDelta,
    /// Guessed from a credit keyword in the description.
    Keyword,
    /// No signal at all; posted as a debit by default.
    Fallback,
}

impl SignBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignBasis::Dash => "dash",
            SignBasis::BalanceDelta => "balance-delta",
            SignBasis::Keyword => "keyword",
            SignBasis::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SignBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dash" => Ok(SignBasis::Dash),
            "balance-delta" | "delta" => Ok(SignBasis::BalanceDelta),
            "keyword" => Ok(SignBasis::Keyword),
            "fallback" => Ok(SignBasis::Fallback),
            _ => Err(format!("Invalid sign basis: {}", s)),
        }
    }
}

/// Counters describing what happened to each line and block of a parse.
///
/// Rejections are never errors; this report is the only trace they leave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostics {
    /// Lines seen in the input text.
    pub lines: usize,
    /// Blank and boilerplate lines dropped by the classifier.
    pub noise_lines: usize,
    /// Lines attached to an open block.
    pub continuation_lines: usize,
    /// Continuation lines with no open block to attach to.
    pub orphaned_lines: usize,
    /// Blocks produced by the segmenter.
    pub blocks: usize,
    /// Blocks the field extractor discarded.
    pub rejected_blocks: usize,
    /// Transactions whose side was guessed.
    pub heuristic_signs: usize,
    /// Whether an opening balance was located (only meaningful for layouts that need one).
    pub opening_balance_found: Option<bool>,
}

impl fmt::Display for ParseDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines ({} noise, {} continuation, {} orphaned), {} blocks, {} rejected, {} heuristic signs",
            self.lines,
            self.noise_lines,
            self.continuation_lines,
            self.orphaned_lines,
            self.blocks,
            self.rejected_blocks,
            self.heuristic_signs,
        )?;
        if self.opening_balance_found == Some(false) {
            write!(f, ", opening balance missing")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posted_sets_one_side() {
        let amount = Decimal::new(5605, 2);
        let solde = Decimal::new(123456, 2);

        let tx = Transaction::posted("01.03.2024", "PAYMENT", DebitCredit::Credit, amount, solde, SignBasis::BalanceDelta);
        assert_eq!(tx.credit, Some(amount));
        assert_eq!(tx.debit, None);
        assert_eq!(tx.net_amount(), amount);

        let tx = Transaction::posted("01.03.2024", "FEE", DebitCredit::Debit, -amount, solde, SignBasis::Fallback);
        assert_eq!(tx.debit, Some(amount));
        assert_eq!(tx.credit, None);
        assert_eq!(tx.side(), DebitCredit::Debit);
        assert!(tx.is_heuristic());
    }

    #[test]
    fn test_debit_credit_from_str() {
        assert_eq!("DBIT".parse::<DebitCredit>().ok(), Some(DebitCredit::Debit));
        assert_eq!("c".parse::<DebitCredit>().ok(), Some(DebitCredit::Credit));
        assert!("X".parse::<DebitCredit>().is_err());
    }

    #[test]
    fn test_sign_basis_round_trips_through_str() {
        for basis in [SignBasis::Dash, SignBasis::BalanceDelta, SignBasis::Keyword, SignBasis::Fallback] {
            assert_eq!(basis.as_str().parse::<SignBasis>(), Ok(basis));
        }
    }
}
