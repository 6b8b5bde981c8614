//! Carried-balance statement layout.
//!
//! The statement opens with a brought-forward balance ("Solde reporté",
//! "Saldovortrag", ...). Every record ends in `amount balance value-date`:
//!
//! ```text
//! Solde reporté                              1'000.00
//! 05.03.2024 Paiement Migros   50.00   950.00   05.03.2024
//! ```
//!
//! The side is never printed; it comes from comparing each new balance with
//! the running one, which is threaded through the blocks as a fold.

use super::{
    clean_description, compile_phrases, Assembler, ParseOutcome, StatementLayout, StatementParser,
    OPENING_BALANCE_PATTERN, PLACEHOLDER_DESCRIPTION,
};
use crate::amount::{amount_tokens, round2, signed_token_value, to_decimal, AMOUNT_PATTERN, DATE_PATTERN};
use crate::segment::{leading_date_re, segment, NoiseFilter, SegmentRules, TransactionBlock};
use crate::sign::side_from_keywords;
use crate::types::{DebitCredit, SignBasis, Transaction};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

const NOISE_PHRASES: &[&str] = &[
    r"(?i)cours\s+de\s+change\s*:?\s*[\d'.,]+",
    r"(?i)umrechnungskurs\s*:?\s*[\d'.,]+",
    r"(?i)exchange\s+rate\s*:?\s*[\d'.,]+",
    r"(?i)(?:montant|betrag|amount)\s+(?:en\s+|in\s+)?[A-Z]{3}\s*[\d'.,]+",
    r"(?i)d[eé]tails?\s+supprim[eé]s?",
    r"(?i)details?\s+unterdr[uü]ckt",
    r"(?i)details?\s+suppressed",
];

fn opening_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(OPENING_BALANCE_PATTERN).expect("opening balance regex"))
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?P<amount>{AMOUNT_PATTERN})\s+[-–]?(?P<balance>{AMOUNT_PATTERN})-?\s+(?P<value_date>{DATE_PATTERN})\b"
        ))
        .expect("anchor regex")
    })
}

fn noise_phrases() -> &'static [Regex] {
    static PHRASES: OnceLock<Vec<Regex>> = OnceLock::new();
    PHRASES.get_or_init(|| compile_phrases(NOISE_PHRASES))
}

/// Find the brought-forward balance: the last amount on the first line
/// announcing it, negative when a minus sign precedes it.
pub fn find_opening_balance(text: &str) -> Option<Decimal> {
    text.lines().map(str::trim).find(|line| opening_re().is_match(line)).and_then(|line| {
        let token = amount_tokens(line).pop()?;
        let value = to_decimal(token.as_str());
        let negative = line[..token.start()].trim_end().ends_with(['-', '–']);
        Some(if negative { -value } else { value })
    })
}

/// Parser for the carried-balance layout.
#[derive(Debug, Clone)]
pub struct CarriedBalanceParser {
    noise: NoiseFilter,
}

impl Default for CarriedBalanceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CarriedBalanceParser {
    pub fn new() -> Self {
        Self::with_noise(StatementLayout::CarriedBalance.default_noise())
    }

    pub fn with_noise(noise: NoiseFilter) -> Self {
        Self { noise }
    }

    /// Read one block against the running balance; returns the transaction,
    /// whose `solde` becomes the next running balance.
    fn extract(block: &TransactionBlock, running: Decimal) -> Result<Transaction, &'static str> {
        let date = block.date().ok_or("no leading date")?;
        let joined = block.joined();
        let anchor = anchor_re()
            .captures_iter(&joined)
            .last()
            .ok_or("no amount/balance/value-date anchor")?;

        let whole = anchor.get(0).ok_or("no amount/balance/value-date anchor")?;
        let printed = to_decimal(&anchor["amount"]);
        let balance = anchor
            .name("balance")
            .map(|m| signed_token_value(&joined, m.start(), m.end()))
            .ok_or("no amount/balance/value-date anchor")?;

        let rest = format!("{} {}", &joined[..whole.start()], &joined[whole.end()..]);
        let rest = leading_date_re().replace(rest.trim_start(), "");
        let mut description = clean_description(&rest, noise_phrases());
        if description.is_empty() {
            description = PLACEHOLDER_DESCRIPTION.to_string();
        }

        let delta = round2(balance - running);
        let (side, amount, basis) = if delta < Decimal::ZERO {
            (DebitCredit::Debit, -delta, SignBasis::BalanceDelta)
        } else if delta > Decimal::ZERO {
            (DebitCredit::Credit, delta, SignBasis::BalanceDelta)
        } else {
            let (side, basis) = side_from_keywords(&description);
            (side, printed, basis)
        };

        if amount.is_zero() {
            return Err("zero amount");
        }

        Ok(Transaction::posted(date, description, side, amount, balance, basis))
    }
}

impl StatementParser for CarriedBalanceParser {
    fn layout(&self) -> StatementLayout {
        StatementLayout::CarriedBalance
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let segmentation = segment(text, &self.noise, &SegmentRules::default());
        let mut assembler = Assembler::new(self.layout(), segmentation.diagnostics);

        let Some(opening) = find_opening_balance(text) else {
            log::warn!("{}: no brought-forward balance line, cannot establish a baseline", self.layout());
            assembler.diagnostics_mut().opening_balance_found = Some(false);
            assembler.diagnostics_mut().rejected_blocks = segmentation.blocks.len();
            return assembler.finish();
        };
        assembler.diagnostics_mut().opening_balance_found = Some(true);

        segmentation.blocks.iter().fold(opening, |running, block| {
            match Self::extract(block, running) {
                Ok(transaction) => {
                    let next = transaction.solde;
                    assembler.push(transaction);
                    next
                }
                Err(reason) => {
                    assembler.reject(block, reason);
                    running
                }
            }
        });

        assembler.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_opening_balance_variants() {
        assert_eq!(find_opening_balance("x\nSolde reporté 31.12.2023 1'000.00\n"), Some(dec("1000.00")));
        assert_eq!(find_opening_balance("SOLDE REPORTE 12.50"), Some(dec("12.50")));
        assert_eq!(find_opening_balance("Saldovortrag - 80.00"), Some(dec("-80.00")));
        assert_eq!(find_opening_balance("Solde reporté"), None);
        assert_eq!(find_opening_balance("01.03.2024 Paiement 10.00 90.00 01.03.2024"), None);
    }

    #[test]
    fn test_debit_from_delta() {
        let text = "Solde reporté 1'000.00\n\
                    05.03.2024 Paiement Migros 50.00 950.00 05.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);

        assert_eq!(outcome.transactions.len(), 1);
        let tx = &outcome.transactions[0];
        assert_eq!(tx.date, "05.03.2024");
        assert_eq!(tx.description, "Paiement Migros");
        assert_eq!(tx.debit, Some(dec("50.00")));
        assert_eq!(tx.credit, None);
        assert_eq!(tx.solde, dec("950.00"));
        assert_eq!(outcome.diagnostics.opening_balance_found, Some(true));
    }

    #[test]
    fn test_running_balance_threads_through_blocks() {
        let text = "Solde reporté 1'000.00\n\
                    05.03.2024 Paiement 50.00 950.00 05.03.2024\n\
                    06.03.2024 Virement reçu\n\
                    Donneur d'ordre: ACME SA 1'200.00 2'150.00 06.03.2024\n\
                    Cours de change 1.0234 Détails supprimés\n\
                    07.03.2024 Frais sans ancre\n\
                    08.03.2024 Carte 10.00 2'140.00 08.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);

        assert_eq!(outcome.transactions.len(), 3);
        assert_eq!(outcome.transactions[1].credit, Some(dec("1200.00")));
        assert_eq!(outcome.transactions[1].description, "Virement reçu Donneur d'ordre: ACME SA");
        assert_eq!(outcome.transactions[2].debit, Some(dec("10.00")));
        assert_eq!(outcome.diagnostics.rejected_blocks, 1);
    }

    #[test]
    fn test_overdraft_balances() {
        let text = "Saldovortrag - 80.00\n\
                    05.03.2024 Retrait 20.00 -100.00 05.03.2024\n\
                    06.03.2024 Versement 50.00 –50.00 06.03.2024\n\
                    07.03.2024 Salaire 150.00 100.00 07.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);

        assert_eq!(outcome.diagnostics.rejected_blocks, 0);
        let summary: Vec<(Option<Decimal>, Option<Decimal>, Decimal)> =
            outcome.transactions.iter().map(|tx| (tx.debit, tx.credit, tx.solde)).collect();
        assert_eq!(
            summary,
            vec![
                (Some(dec("20.00")), None, dec("-100.00")),
                (None, Some(dec("50.00")), dec("-50.00")),
                (None, Some(dec("150.00")), dec("100.00")),
            ]
        );
        assert_eq!(outcome.transactions[0].description, "Retrait");
    }

    #[test]
    fn test_transfer_keywords_inside_records_are_kept() {
        let text = "Solde reporté 0.00\n\
                    05.03.2024 Kontoübertrag Sparkonto 500.00 500.00 05.03.2024\n\
                    06.03.2024 Karte Coop 20.00 480.00 06.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);

        assert_eq!(outcome.transactions.len(), 2);
        assert_eq!(outcome.transactions[0].credit, Some(dec("500.00")));
        assert_eq!(outcome.transactions[1].debit, Some(dec("20.00")));
        assert_eq!(outcome.diagnostics.noise_lines, 1);
    }

    #[test]
    fn test_missing_opening_balance_yields_nothing() {
        let text = "05.03.2024 Paiement 50.00 950.00 05.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.diagnostics.opening_balance_found, Some(false));
        assert_eq!(outcome.diagnostics.rejected_blocks, 1);
    }

    #[test]
    fn test_zero_delta_falls_back_to_printed_amount() {
        let text = "Solde reporté 100.00\n\
                    05.03.2024 Versement 25.00 100.00 05.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);
        let tx = &outcome.transactions[0];
        assert_eq!(tx.credit, Some(dec("25.00")));
        assert_eq!(tx.sign_basis, SignBasis::Keyword);
    }

    #[test]
    fn test_placeholder_description() {
        let text = "Solde reporté 100.00\n05.03.2024 40.00 60.00 05.03.2024\n";
        let outcome = CarriedBalanceParser::new().parse(text);
        assert_eq!(outcome.transactions[0].description, PLACEHOLDER_DESCRIPTION);
    }
}
