//! Dash-marked statement layout.
//!
//! The side is printed as a dash next to the amount: `- 200.00` is a credit,
//! `200.00 -` a debit, and the last number of the record is the balance.
//! Records may wrap over several lines; a block stops at the next date, at
//! page boilerplate, after an `amount amount date` trailer line, or after
//! [`MAX_BLOCK_LINES`] lines.

use super::{
    clean_description, compile_phrases, Assembler, ParseOutcome, StatementLayout, StatementParser,
    PLACEHOLDER_DESCRIPTION,
};
use crate::amount::{amount_tokens, is_standalone, round2, to_decimal, AMOUNT_PATTERN, DATE_PATTERN};
use crate::segment::{segment, NoiseFilter, SegmentRules, TransactionBlock};
use crate::types::{DebitCredit, SignBasis, Transaction};
use regex::Regex;
use rust_decimal::Decimal;
use std::ops::Range;
use std::sync::OnceLock;

/// Hard cap on lines per record, against runaway accumulation.
pub const MAX_BLOCK_LINES: usize = 10;

/// Smallest amount the no-dash fallback will post as a debit.
const FALLBACK_MIN_AMOUNT: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

const NOISE_PHRASES: &[&str] = &[r"(?i)\bvaleur\b", r"(?i)\bvaluta\b"];

/// A wrapped record's last line: `amount [-] [-] balance value-date`.
fn trailer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"{AMOUNT_PATTERN}(?:\s*[-–])?\s+(?:[-–]\s*)?{AMOUNT_PATTERN}\s+{DATE_PATTERN}\s*$"
        ))
        .expect("trailer regex")
    })
}

fn debit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?P<amount>{AMOUNT_PATTERN})\s*[-–](?:\s|$)")).expect("debit regex"))
}

fn credit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?:^|\s)[-–]\s*(?P<amount>{AMOUNT_PATTERN})\b")).expect("credit regex"))
}

fn noise_phrases() -> &'static [Regex] {
    static PHRASES: OnceLock<Vec<Regex>> = OnceLock::new();
    PHRASES.get_or_init(|| compile_phrases(NOISE_PHRASES))
}

/// Find the first dash-marked amount and blank its whole token out of `text`.
fn take_marked(re: &Regex, text: &mut String) -> Option<Decimal> {
    let haystack = text.as_str();
    let (value, span) = re.captures_iter(haystack).find_map(|caps| {
        let amount = caps.name("amount")?;
        let whole = caps.get(0)?;
        is_standalone(haystack, amount.start(), amount.end()).then(|| (to_decimal(amount.as_str()), whole.range()))
    })?;
    blank(text, span);
    Some(value)
}

fn blank(text: &mut String, span: Range<usize>) {
    let width = span.len();
    text.replace_range(span, &" ".repeat(width));
}

/// Parser for the dash-marked layout.
#[derive(Debug, Clone)]
pub struct DashMarkedParser {
    noise: NoiseFilter,
}

impl Default for DashMarkedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DashMarkedParser {
    pub fn new() -> Self {
        Self::with_noise(StatementLayout::DashMarked.default_noise())
    }

    pub fn with_noise(noise: NoiseFilter) -> Self {
        Self { noise }
    }

    fn rules() -> SegmentRules {
        SegmentRules {
            max_lines: Some(MAX_BLOCK_LINES),
            noise_closes_block: true,
            closing_line: Some(trailer_re().clone()),
        }
    }

    fn extract(block: &TransactionBlock, previous: Option<Decimal>) -> Result<Transaction, &'static str> {
        let date = block.date().ok_or("no leading date")?;
        let joined = block.joined();
        let mut body = joined[date.len()..].to_string();

        let debit = take_marked(debit_re(), &mut body);
        let credit = take_marked(credit_re(), &mut body);

        let balance_token = amount_tokens(&body).last().map(|m| (to_decimal(m.as_str()), m.range()));

        let (side, amount, basis) = match (debit, credit) {
            (Some(debit), Some(credit)) => {
                let net = credit - debit;
                let side = if net < Decimal::ZERO { DebitCredit::Debit } else { DebitCredit::Credit };
                (side, net.abs(), SignBasis::Dash)
            }
            (Some(debit), None) => (DebitCredit::Debit, debit, SignBasis::Dash),
            (None, Some(credit)) => (DebitCredit::Credit, credit, SignBasis::Dash),
            (None, None) => {
                let balance_start = balance_token.as_ref().map(|(_, span)| span.start);
                let guess = amount_tokens(&body)
                    .into_iter()
                    .filter(|m| Some(m.start()) != balance_start)
                    .map(|m| (to_decimal(m.as_str()), m.range()))
                    .find(|(value, _)| *value > FALLBACK_MIN_AMOUNT)
                    .ok_or("no dash-marked amount")?;
                blank(&mut body, guess.1);
                (DebitCredit::Debit, guess.0, SignBasis::Fallback)
            }
        };

        if amount.is_zero() {
            return Err("debit and credit cancel out");
        }

        let solde = match balance_token {
            Some((balance, span)) => {
                blank(&mut body, span);
                balance
            }
            None => {
                let previous = previous.ok_or("no balance and no previous balance")?;
                let signed = if side == DebitCredit::Credit { amount } else { -amount };
                round2(previous + signed)
            }
        };

        let mut description = clean_description(&body, noise_phrases());
        if description.is_empty() {
            description = PLACEHOLDER_DESCRIPTION.to_string();
        }

        Ok(Transaction::posted(date, description, side, amount, solde, basis))
    }
}

impl StatementParser for DashMarkedParser {
    fn layout(&self) -> StatementLayout {
        StatementLayout::DashMarked
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let segmentation = segment(text, &self.noise, &Self::rules());
        let mut assembler = Assembler::new(self.layout(), segmentation.diagnostics);
        let mut previous: Option<Decimal> = None;

        for block in &segmentation.blocks {
            match Self::extract(block, previous) {
                Ok(transaction) => {
                    previous = Some(transaction.solde);
                    assembler.push(transaction);
                }
                Err(reason) => assembler.reject(block, reason),
            }
        }

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
    fn test_credit_from_leading_dash() {
        let text = "01.03.2024 Dépôt initial - 600.00 600.00\n\
                    02.03.2024 Virement salaire - 200.00 800.00\n";
        let outcome = DashMarkedParser::new().parse(text);

        assert_eq!(outcome.transactions.len(), 2);
        let tx = &outcome.transactions[1];
        assert_eq!(tx.credit, Some(dec("200.00")));
        assert_eq!(tx.debit, None);
        assert_eq!(tx.solde, dec("800.00"));
        assert_eq!(tx.description, "Virement salaire");
        assert_eq!(tx.sign_basis, SignBasis::Dash);
    }

    #[test]
    fn test_debit_from_trailing_dash() {
        let text = "03.03.2024 Achat Coop 45.00 – 755.00\n";
        let tx = &DashMarkedParser::new().parse(text).transactions[0];
        assert_eq!(tx.debit, Some(dec("45.00")));
        assert_eq!(tx.solde, dec("755.00"));
        assert_eq!(tx.description, "Achat Coop");
    }

    #[test]
    fn test_wrapped_record_and_trailer_stop() {
        let text = "04.03.2024 Ordre permanent\n\
                    Loyer mars\n\
                    1'500.00 - 2'000.00 04.03.2024\n\
                    stray line after trailer\n\
                    05.03.2024 Frais 5.00 - 1'995.00\n";
        let outcome = DashMarkedParser::new().parse(text);

        assert_eq!(outcome.transactions.len(), 2);
        assert_eq!(outcome.transactions[0].debit, Some(dec("1500.00")));
        assert_eq!(outcome.transactions[0].solde, dec("2000.00"));
        assert_eq!(outcome.transactions[0].description, "Ordre permanent Loyer mars");
        assert_eq!(outcome.diagnostics.orphaned_lines, 1);
    }

    #[test]
    fn test_both_markers_are_netted() {
        let text = "06.03.2024 Correction 10.00 - - 25.00 115.00\n";
        let tx = &DashMarkedParser::new().parse(text).transactions[0];
        assert_eq!(tx.credit, Some(dec("15.00")));
        assert_eq!(tx.debit, None);
    }

    #[test]
    fn test_fallback_guess_is_tagged() {
        let text = "07.03.2024 Prélèvement 80.00 920.00\n";
        let outcome = DashMarkedParser::new().parse(text);
        let tx = &outcome.transactions[0];
        assert_eq!(tx.debit, Some(dec("80.00")));
        assert_eq!(tx.solde, dec("920.00"));
        assert_eq!(tx.sign_basis, SignBasis::Fallback);
        assert_eq!(outcome.diagnostics.heuristic_signs, 1);
    }

    #[test]
    fn test_fallback_threshold() {
        let text = "07.03.2024 Arrondi 0.05 920.00\n\
                    08.03.2024 Arrondi 0.06 919.94\n";
        let outcome = DashMarkedParser::new().parse(text);

        assert_eq!(FALLBACK_MIN_AMOUNT, dec("0.05"));
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].debit, Some(dec("0.06")));
        assert_eq!(outcome.diagnostics.rejected_blocks, 1);
    }

    #[test]
    fn test_url_in_record_is_not_noise() {
        let text = "01.03.2024 Dépôt - 600.00 600.00\n\
                    02.03.2024 Achat www.digitec.ch 56.05 - 543.95\n\
                    03.03.2024 Carte 10.00 - 533.95\n";
        let outcome = DashMarkedParser::new().parse(text);

        assert_eq!(outcome.diagnostics.noise_lines, 0);
        assert_eq!(outcome.transactions[1].description, "Achat www.digitec.ch");
        assert_eq!(outcome.transactions[1].debit, Some(dec("56.05")));
        assert_eq!(outcome.transactions[2].debit, Some(dec("10.00")));
    }

    #[test]
    fn test_balance_derived_when_missing() {
        let text = "01.03.2024 Dépôt - 600.00 600.00\n\
                    02.03.2024 Retrait 100.00 -\n";
        let outcome = DashMarkedParser::new().parse(text);
        assert_eq!(outcome.transactions[1].solde, dec("500.00"));
    }

    #[test]
    fn test_rejects_blocks_without_side() {
        let text = "08.03.2024 Information only\n\
                    09.03.2024 Balance only 920.00\n";
        let outcome = DashMarkedParser::new().parse(text);
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.diagnostics.rejected_blocks, 2);
    }

    #[test]
    fn test_line_cap() {
        let mut text = String::from("10.03.2024 Long record\n");
        for i in 0..12 {
            text.push_str(&format!("detail {i}\n"));
        }
        let outcome = DashMarkedParser::new().parse(&text);
        assert_eq!(outcome.diagnostics.continuation_lines, MAX_BLOCK_LINES - 1);
        assert_eq!(outcome.diagnostics.orphaned_lines, 12 - (MAX_BLOCK_LINES - 1));
    }
}
