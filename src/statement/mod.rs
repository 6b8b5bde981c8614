//! Bank statement text → transaction reconstruction.
//!
//! Each supported statement layout has its own parser behind the
//! [`StatementParser`] trait. The layout is always chosen by the caller;
//! nothing here tries to guess it from the text.

pub mod carried;
pub mod columnar;
pub mod dashed;

pub use carried::CarriedBalanceParser;
pub use columnar::ColumnarParser;
pub use dashed::DashMarkedParser;

use crate::amount::round2;
use crate::error::{Error, Result};
use crate::segment::{date_re, NoiseFilter, TransactionBlock};
use crate::types::{ParseDiagnostics, Transaction};
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Description used when nothing readable is left after cleanup.
pub const PLACEHOLDER_DESCRIPTION: &str = "Transaction";

/// Page furniture shared by every layout.
///
/// Noise wins over a leading date in `classify`, so every signature here is
/// anchored at the line start.
const COMMON_NOISE: &[&str] = &[
    r"(?i)^(?:page|seite|p\.)?\s*\d{1,3}\s*/\s*\d{1,3}$",
    r"(?i)^(?:page|seite)\s+\d+(?:\s+(?:of|de|sur|von)\s+\d+)?$",
    r"^[-_=*.\s]{3,}$",
    r"(?i)^(?:date|datum)\b.*\b(?:solde|saldo|balance)$",
    r"(?i)^(?:date|datum)?\s*(?:texte\s+de\s+comptabilisation|buchungstext|posting\s+text).*\b(?:solde|saldo|balance)\b",
    r"(?i)^(?:relev[eé]\s+de\s+compte|kontoauszug|account\s+statement)\b",
    r"(?i)^(?:banque|bank)\s+\S+.*\b(?:sa|ag)$",
    r"(?i)^(?:www\.|https?://)\S+",
    r"(?i)^(?:t[eé]l(?:[eé]phone)?|tel|fax)\s*[.:]?\s*\+?\d[\d\s]{6,}",
    r"(?i)^(?:case\s+postale|postfach)\b",
    r"(?i)^(?:total|totaux|umsatztotal|solde\s+final|schlusssaldo|closing\s+balance)\b",
    OPENING_BALANCE_PATTERN,
];

/// Brought-forward balance announcement at the start of a line, case and
/// accent insensitive. Never matches inside a dated record ("Kontoübertrag").
pub(crate) const OPENING_BALANCE_PATTERN: &str = concat!(
    r"(?i)^(?:solde\s+report[eé]\x{0301}?|report\s+de\s+solde|solde\s+pr[eé]\x{0301}?c[eé]\x{0301}?dent",
    r"|solde\s+initial|saldo\s*vortrag|[uü]\x{0308}?bertrag|anfangssaldo|brought\s+forward|opening\s+balance)"
);

/// Supported statement layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementLayout {
    /// Column layout: amount and balance printed on the date line.
    Columnar,
    /// Opening balance line, then `amount balance value-date` per record.
    CarriedBalance,
    /// Side marked by a dash next to the amount.
    DashMarked,
}

impl FromStr for StatementLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "a" | "columnar" => Ok(StatementLayout::Columnar),
            "b" | "carried" | "carried-balance" => Ok(StatementLayout::CarriedBalance),
            "c" | "dash" | "dashed" | "dash-marked" => Ok(StatementLayout::DashMarked),
            _ => Err(Error::InvalidLayout(s.to_string())),
        }
    }
}

impl fmt::Display for StatementLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StatementLayout {
    pub const ALL: [StatementLayout; 3] = [
        StatementLayout::Columnar,
        StatementLayout::CarriedBalance,
        StatementLayout::DashMarked,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StatementLayout::Columnar => "columnar",
            StatementLayout::CarriedBalance => "carried-balance",
            StatementLayout::DashMarked => "dash-marked",
        }
    }

    /// Boilerplate signatures known for this layout.
    pub fn default_noise(&self) -> NoiseFilter {
        let specific: &[&str] = match self {
            StatementLayout::Columnar => &[r"(?i)^(?:valeur|valuta|value)\s+(?:date|datum)\b"],
            StatementLayout::CarriedBalance => &[r"(?i)^(?:mouvements|bewegungen|transactions)\s*$"],
            StatementLayout::DashMarked => &[r"(?i)^(?:d[eé]bit\s+cr[eé]dit|soll\s+haben|debit\s+credit)\b"],
        };
        NoiseFilter::new(COMMON_NOISE.iter().chain(specific)).expect("built-in noise patterns compile")
    }

    /// Parser for this layout with its default noise list.
    pub fn parser(&self) -> Box<dyn StatementParser> {
        self.parser_with_noise(self.default_noise())
    }

    /// Parser for this layout using a caller-supplied noise list.
    pub fn parser_with_noise(&self, noise: NoiseFilter) -> Box<dyn StatementParser> {
        match self {
            StatementLayout::Columnar => Box::new(ColumnarParser::with_noise(noise)),
            StatementLayout::CarriedBalance => Box::new(CarriedBalanceParser::with_noise(noise)),
            StatementLayout::DashMarked => Box::new(DashMarkedParser::with_noise(noise)),
        }
    }
}

/// A statement parser for one layout.
///
/// Implementations are pure: the same text always yields the same outcome
/// and nothing is shared between calls.
pub trait StatementParser: Send + Sync {
    fn layout(&self) -> StatementLayout;

    /// Reconstruct transactions from extracted statement text.
    fn parse(&self, text: &str) -> ParseOutcome;
}

/// Transactions in document order plus what was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub transactions: Vec<Transaction>,
    pub diagnostics: ParseDiagnostics,
}

impl ParseOutcome {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Parse `text` with the default parser for `layout`.
///
/// Unlike [`StatementParser::parse`], an empty result is an error here.
pub fn parse_statement(text: &str, layout: StatementLayout) -> Result<ParseOutcome> {
    ensure_found(layout.parser().parse(text))
}

/// Turn an empty outcome into [`Error::NoTransactions`].
pub fn ensure_found(outcome: ParseOutcome) -> Result<ParseOutcome> {
    if outcome.is_empty() {
        return Err(Error::NoTransactions);
    }
    Ok(outcome)
}

/// Collects transactions in block order and keeps the diagnostics current.
pub(crate) struct Assembler {
    layout: StatementLayout,
    transactions: Vec<Transaction>,
    diagnostics: ParseDiagnostics,
}

impl Assembler {
    pub(crate) fn new(layout: StatementLayout, diagnostics: ParseDiagnostics) -> Self {
        Self {
            layout,
            transactions: Vec::new(),
            diagnostics,
        }
    }

    pub(crate) fn push(&mut self, transaction: Transaction) {
        debug_assert!(transaction.debit.is_none() || transaction.credit.is_none());
        if transaction.is_heuristic() {
            self.diagnostics.heuristic_signs += 1;
        }
        self.transactions.push(transaction);
    }

    pub(crate) fn reject(&mut self, block: &TransactionBlock, reason: &str) {
        self.diagnostics.rejected_blocks += 1;
        log::debug!("{}: dropped block {:?}: {}", self.layout, block.first_line(), reason);
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut ParseDiagnostics {
        &mut self.diagnostics
    }

    pub(crate) fn finish(self) -> ParseOutcome {
        log::info!(
            "{}: {} transactions ({})",
            self.layout,
            self.transactions.len(),
            self.diagnostics
        );
        ParseOutcome {
            transactions: self.transactions,
            diagnostics: self.diagnostics,
        }
    }
}

/// Strip phrases and dates, collapse whitespace.
pub(crate) fn clean_description(raw: &str, phrases: &[Regex]) -> String {
    let mut text = date_re().replace_all(raw, " ").into_owned();
    for phrase in phrases {
        text = phrase.replace_all(&text, " ").into_owned();
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compile a fixed phrase list; the patterns are literals in this crate.
pub(crate) fn compile_phrases(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in phrase pattern compiles"))
        .collect()
}

/// A point where the balance chain does not add up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceBreak {
    /// Index of the transaction whose balance is off.
    pub index: usize,
    pub date: String,
    /// `solde[index - 1] + credit - debit`.
    pub expected: Decimal,
    pub actual: Decimal,
}

impl fmt::Display for BalanceBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({}): expected balance {:.2}, statement shows {:.2} (off by {:.2})",
            self.index + 1,
            self.date,
            self.expected,
            self.actual,
            self.actual - self.expected
        )
    }
}

/// Check `solde[i] == solde[i-1] + credit[i] - debit[i]` to the cent.
///
/// A break usually means two records were merged or a side was guessed
/// wrong. The parsers never call this themselves.
pub fn check_balance_chain(transactions: &[Transaction]) -> Vec<BalanceBreak> {
    transactions
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let expected = round2(pair[0].solde + pair[1].net_amount());
            let actual = round2(pair[1].solde);
            (expected != actual).then(|| BalanceBreak {
                index: i + 1,
                date: pair[1].date.clone(),
                expected,
                actual,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DebitCredit, SignBasis};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("a".parse::<StatementLayout>().unwrap(), StatementLayout::Columnar);
        assert_eq!("Carried-Balance".parse::<StatementLayout>().unwrap(), StatementLayout::CarriedBalance);
        assert_eq!("C".parse::<StatementLayout>().unwrap(), StatementLayout::DashMarked);
        assert!("auto".parse::<StatementLayout>().is_err());
    }

    #[test]
    fn test_parser_dispatch() {
        for layout in StatementLayout::ALL {
            assert_eq!(layout.parser().layout(), layout);
        }
    }

    #[test]
    fn test_default_noise_rejects_boilerplate() {
        for layout in StatementLayout::ALL {
            let noise = layout.default_noise();
            assert!(noise.is_noise("Page 3 / 7"));
            assert!(noise.is_noise("2 / 4"));
            assert!(noise.is_noise("Date Texte de comptabilisation Débit Crédit Valeur Solde"));
            assert!(noise.is_noise("Solde reporté 1'000.00"));
            assert!(noise.is_noise("SALDOVORTRAG 12.50"));
            assert!(noise.is_noise("Banque Exemple SA"));
            assert!(noise.is_noise("---------------"));
            assert!(!noise.is_noise("Paiement Migros Lausanne"));
            assert!(!noise.is_noise("01.03.2024 PAYMENT ABC 56.05 1'234.56"));
        }
    }

    #[test]
    fn test_default_noise_keeps_dated_records() {
        let footers = ["www.exemple.ch", "https://exemple.ch/ebanking", "Tél. 021 123 45 67", "Übertrag 500.00"];
        let records = [
            "02.03.2024 Achat www.digitec.ch 56.05 943.95",
            "02.03.2024 Paiement https://shop.example 12.00 931.95",
            "05.03.2024 Kontoübertrag Sparkonto 500.00 500.00 05.03.2024",
            "05.03.2024 Übertrag Miete 450.00 50.00 05.03.2024",
            "06.03.2024 Report de solde épargne 10.00 60.00",
            "06.03.2024 Solde initial carte - 10.00 70.00",
            "07.03.2024 Hotline Tel 0800 800 800 5.00 65.00",
        ];
        for layout in StatementLayout::ALL {
            let noise = layout.default_noise();
            for footer in footers {
                assert!(noise.is_noise(footer), "{layout}: {footer}");
            }
            for record in records {
                assert!(!noise.is_noise(record), "{layout}: {record}");
            }
        }
    }

    #[test]
    fn test_clean_description() {
        let phrases = compile_phrases(&[r"(?i)details suppressed"]);
        assert_eq!(
            clean_description("  Paiement   05.03.2024 ACME\tDetails suppressed  ", &phrases),
            "Paiement ACME"
        );
    }

    #[test]
    fn test_ensure_found() {
        assert!(matches!(ensure_found(ParseOutcome::default()), Err(Error::NoTransactions)));
    }

    #[test]
    fn test_balance_chain() {
        let txs = vec![
            Transaction::posted("01.03.2024", "a", DebitCredit::Credit, dec("100.00"), dec("100.00"), SignBasis::Dash),
            Transaction::posted("02.03.2024", "b", DebitCredit::Debit, dec("30.00"), dec("70.00"), SignBasis::Dash),
            Transaction::posted("03.03.2024", "c", DebitCredit::Credit, dec("5.00"), dec("80.00"), SignBasis::Dash),
        ];
        let breaks = check_balance_chain(&txs);
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].index, 2);
        assert_eq!(breaks[0].expected, dec("75.00"));
        assert_eq!(breaks[0].actual, dec("80.00"));
        assert!(check_balance_chain(&txs[..2]).is_empty());
    }
}
