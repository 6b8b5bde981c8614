//! Amount normalization for locale-formatted statement figures.
//!
//! Statements print amounts Swiss style (`1'627.10`), sometimes with a
//! comma decimal (`56,05`) or a space as thousands separator (`1 234,56`).

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::OnceLock;

/// Regex fragment for one amount token: apostrophe-grouped or plain digits, two decimals.
pub(crate) const AMOUNT_PATTERN: &str = r"(?:\d{1,3}(?:['’]\d{3})+|\d+)\.\d{2}";

/// Regex fragment for a `dd.mm.yyyy` date token.
pub(crate) const DATE_PATTERN: &str = r"\d{2}\.\d{2}\.\d{4}";

/// Every standalone amount token in a line.
pub fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\b{AMOUNT_PATTERN}\b")).expect("amount regex"))
}

/// Amount tokens in `text`, skipping digit pairs that belong to a date.
pub fn amount_tokens(text: &str) -> Vec<regex::Match<'_>> {
    amount_re()
        .find_iter(text)
        .filter(|m| is_standalone(text, m.start(), m.end()))
        .collect()
}

/// A `dd.mm` prefix of `dd.mm.yyyy` also looks like an amount; reject spans
/// glued to a further `.digit` or preceded by a dot.
pub(crate) fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    if text[..start].ends_with('.') {
        return false;
    }
    let mut after = text[end..].chars();
    !matches!((after.next(), after.next()), (Some('.'), Some(d)) if d.is_ascii_digit())
}

/// Parse a printed amount, returning `None` when no number can be read.
///
/// Use this where "no amount printed" must stay distinguishable from zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '’' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();

    // With both separators present the later one is the decimal point.
    let decimal_sep = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ',',
        (Some(_), Some(_)) => '.',
        (Some(_), None) => ',',
        _ => '.',
    };

    let mut cleaned = String::with_capacity(compact.len());
    let mut seen_point = false;
    for c in compact.chars() {
        match c {
            '0'..='9' => cleaned.push(c),
            '-' if cleaned.is_empty() => cleaned.push('-'),
            c if c == decimal_sep && !seen_point => {
                seen_point = true;
                cleaned.push('.');
            }
            _ => {}
        }
    }

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    Decimal::from_str(&cleaned).ok().map(round2)
}

/// Parse a printed amount, treating anything unreadable as zero.
pub fn to_decimal(raw: &str) -> Decimal {
    parse_amount(raw).unwrap_or(Decimal::ZERO)
}

/// Value of the amount token at `start..end` of `text`, negative when a minus
/// (hyphen or en dash) is glued to it: `-30.00`, `–30.00` or `30.00-`.
///
/// Only for balance columns; the dash-marked layout gives dashes a side
/// meaning instead.
pub fn signed_token_value(text: &str, start: usize, end: usize) -> Decimal {
    let value = to_decimal(&text[start..end]);
    let is_minus = |c: Option<char>| matches!(c, Some('-' | '–'));

    let leading = is_minus(text[..start].chars().next_back());
    let mut after = text[end..].chars();
    let trailing = is_minus(after.next()) && after.next().map_or(true, char::is_whitespace);

    if leading || trailing {
        -value
    } else {
        value
    }
}

/// Round to cents, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
