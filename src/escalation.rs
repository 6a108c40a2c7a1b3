// 📈 Rent Escalation - compound monthly indices into a new rent + deposit
//
// Each month's index applies to the previous month's rent (sequential
// compounding). Intermediate values keep full decimal precision; rounding
// to cents happens once, on the outputs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Currency precision (cents)
pub const CURRENCY_DECIMALS: u32 = 2;

/// Round to cents, half away from zero
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    /// `position` is 1-based, matching "month 1", "month 2"...
    #[error("index for month {position} is not a number: {value:?}")]
    InvalidIndexValue { position: usize, value: String },

    #[error("expected {expected} monthly indices, got {actual}")]
    IndexCountMismatch { expected: usize, actual: usize },

    /// The compounded amount does not fit in a decimal
    #[error("escalated amount is out of range")]
    AmountOutOfRange,
}

/// Convert user-entered percentages into numbers, order preserved.
///
/// Blank entries are rejected like any other non-number. A decimal comma
/// (`4,5`) is read as a decimal point; scientific notation is accepted.
pub fn parse_indices<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Decimal>, EscalationError> {
    raw.iter()
        .enumerate()
        .map(|(i, value)| {
            parse_index(value.as_ref()).ok_or_else(|| EscalationError::InvalidIndexValue {
                position: i + 1,
                value: value.as_ref().to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_index(raw: &str) -> Option<Decimal> {
    let text = raw.trim().replace(',', ".");
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Fail unless exactly `expected` indices were supplied
pub fn check_index_count(indices: &[Decimal], expected: u32) -> Result<(), EscalationError> {
    if indices.len() != expected as usize {
        return Err(EscalationError::IndexCountMismatch {
            expected: expected as usize,
            actual: indices.len(),
        });
    }
    Ok(())
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationResult {
    pub old_rent: Decimal,
    pub new_rent: Decimal,
    pub old_deposit: Decimal,
    pub new_deposit: Decimal,
    pub diff_deposit: Decimal,
    pub applied_indices: Vec<Decimal>,
}

// ============================================================================
// CALCULATOR
// ============================================================================

pub struct RentEscalationCalculator;

impl RentEscalationCalculator {
    /// Compound `indices` (percentages, chronological) onto `current_rent`.
    ///
    /// Expects `current_rent > 0`, `deposit_multiplier > 0` and a non-empty
    /// index list; those are checked upstream, not here.
    ///
    /// - `new_deposit` is taken from the *unrounded* compounded rent
    /// - `diff_deposit` is the difference of the two rounded deposits
    ///
    /// Fails with `AmountOutOfRange` instead of overflowing.
    pub fn compute(
        current_rent: Decimal,
        indices: &[Decimal],
        deposit_multiplier: Decimal,
    ) -> Result<EscalationResult, EscalationError> {
        let compounded = indices.iter().try_fold(current_rent, |rent, percentage| {
            percentage
                .checked_div(Decimal::ONE_HUNDRED)
                .and_then(|rate| Decimal::ONE.checked_add(rate))
                .and_then(|factor| rent.checked_mul(factor))
                .ok_or(EscalationError::AmountOutOfRange)
        })?;

        let old_deposit = round_currency(checked_product(current_rent, deposit_multiplier)?);
        let new_deposit = round_currency(checked_product(compounded, deposit_multiplier)?);
        let diff_deposit = new_deposit
            .checked_sub(old_deposit)
            .ok_or(EscalationError::AmountOutOfRange)?;

        Ok(EscalationResult {
            old_rent: current_rent,
            new_rent: round_currency(compounded),
            old_deposit,
            new_deposit,
            diff_deposit: round_currency(diff_deposit),
            applied_indices: indices.to_vec(),
        })
    }
}

fn checked_product(a: Decimal, b: Decimal) -> Result<Decimal, EscalationError> {
    a.checked_mul(b).ok_or(EscalationError::AmountOutOfRange)
}

// ============================================================================
// TESTS
// ============================================================================
