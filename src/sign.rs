//! Debit/credit resolution from balance deltas and description keywords.

use crate::amount::round2;
use crate::types::{DebitCredit, SignBasis};
use rust_decimal::Decimal;

/// Tokens that mark money coming in. Anything else defaults to a debit.
const CREDIT_KEYWORDS: &[&str] = &[
    "credit",
    "crédit",
    "gutschrift",
    "originator",
    "donneur d'ordre",
    "auftraggeber",
    "versement",
    "einzahlung",
    "bonification",
];

/// A decided side and the unsigned amount to post on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub side: DebitCredit,
    pub amount: Decimal,
    pub basis: SignBasis,
}

/// Guess the side from the description alone.
///
/// This is an imprecise fallback; the returned basis says which branch fired.
pub fn side_from_keywords(description: &str) -> (DebitCredit, SignBasis) {
    let lower = description.to_lowercase();
    if CREDIT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        (DebitCredit::Credit, SignBasis::Keyword)
    } else {
        (DebitCredit::Debit, SignBasis::Fallback)
    }
}

/// Resolve the side of a transaction from the balance movement.
///
/// `amount` is the printed amount, or zero when none was printed, in which
/// case the delta supplies it. Without a previous balance, or when the
/// balance did not move, the keyword heuristic decides. Returns `None` when
/// no non-zero amount can be established.
pub fn resolve_by_delta(
    amount: Decimal,
    balance: Decimal,
    previous: Option<Decimal>,
    description: &str,
) -> Option<Resolution> {
    let amount = amount.abs();

    let resolution = match previous {
        Some(previous) => {
            let delta = round2(balance - previous);
            let amount = if amount.is_zero() { delta.abs() } else { amount };
            if delta < Decimal::ZERO {
                Resolution { side: DebitCredit::Debit, amount, basis: SignBasis::BalanceDelta }
            } else if delta > Decimal::ZERO {
                Resolution { side: DebitCredit::Credit, amount, basis: SignBasis::BalanceDelta }
            } else {
                let (side, basis) = side_from_keywords(description);
                Resolution { side, amount, basis }
            }
        }
        None => {
            let (side, basis) = side_from_keywords(description);
            Resolution { side, amount, basis }
        }
    };

    (!resolution.amount.is_zero()).then_some(resolution)
}
