//! Fixed-precision decimal kernel.
//!
//! Every safety value in this crate flows through this module. Arithmetic is
//! exact to the 28 significant digits [`rust_decimal`] carries; rounding
//! happens only at presentation boundaries (storage, hashing, tolerance
//! comparison) with an explicit strategy per quantity:
//!
//! - thickness: 4 fractional digits, half-even
//! - pressure: 2 fractional digits, half-even
//! - stress: whole psi, half-even
//! - remaining life: 1 fractional digit, **toward zero** (safety-mandated)
//!
//! Binary floating point never enters or leaves this module. Checked
//! operations return [`DecimalError`] instead of panicking or saturating:
//! division by zero is [`DecimalError::DivisionByZero`], precision overflow
//! is [`DecimalError::Overflow`].

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

/// Floor applied to relative-difference denominators.
pub const EPSILON: Decimal = dec!(0.000000000001);

/// Comparison tolerance for thickness values, in inches.
pub const THICKNESS_TOLERANCE: Decimal = dec!(0.001);

/// Comparison tolerance for pressure values, in psi.
pub const PRESSURE_TOLERANCE: Decimal = dec!(0.1);

/// Comparison tolerance for stress values, in psi.
pub const STRESS_TOLERANCE: Decimal = dec!(1);

/// Errors raised by checked decimal arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecimalError {
    /// A divisor was exactly zero.
    #[error("division by zero in {operation}")]
    DivisionByZero {
        /// The operation that failed, e.g. `"t_min denominator"`.
        operation: &'static str,
    },

    /// The result exceeded the working precision of the decimal type.
    #[error("precision overflow in {operation}")]
    Overflow {
        /// The operation that overflowed.
        operation: &'static str,
    },
}

/// Checked addition.
///
/// # Errors
///
/// Returns [`DecimalError::Overflow`] if the sum exceeds working precision.
pub fn add(a: Decimal, b: Decimal, operation: &'static str) -> Result<Decimal, DecimalError> {
    a.checked_add(b).ok_or(DecimalError::Overflow { operation })
}

/// Checked subtraction.
///
/// # Errors
///
/// Returns [`DecimalError::Overflow`] if the difference exceeds working
/// precision.
pub fn sub(a: Decimal, b: Decimal, operation: &'static str) -> Result<Decimal, DecimalError> {
    a.checked_sub(b).ok_or(DecimalError::Overflow { operation })
}

/// Checked multiplication.
///
/// # Errors
///
/// Returns [`DecimalError::Overflow`] if the product exceeds working
/// precision.
pub fn mul(a: Decimal, b: Decimal, operation: &'static str) -> Result<Decimal, DecimalError> {
    a.checked_mul(b).ok_or(DecimalError::Overflow { operation })
}

/// Checked division.
///
/// # Errors
///
/// Returns [`DecimalError::DivisionByZero`] if `b` is zero, or
/// [`DecimalError::Overflow`] if the quotient exceeds working precision.
pub fn div(a: Decimal, b: Decimal, operation: &'static str) -> Result<Decimal, DecimalError> {
    if b.is_zero() {
        return Err(DecimalError::DivisionByZero { operation });
    }
    a.checked_div(b).ok_or(DecimalError::Overflow { operation })
}

/// Rounds a thickness to 4 fractional digits (half-even) at fixed scale.
#[must_use]
pub fn round_thickness(value: Decimal) -> Decimal {
    round_fixed(value, 4, RoundingStrategy::MidpointNearestEven)
}

/// Rounds a pressure to 2 fractional digits (half-even) at fixed scale.
#[must_use]
pub fn round_pressure(value: Decimal) -> Decimal {
    round_fixed(value, 2, RoundingStrategy::MidpointNearestEven)
}

/// Rounds a stress to whole psi (half-even).
#[must_use]
pub fn round_stress(value: Decimal) -> Decimal {
    round_fixed(value, 0, RoundingStrategy::MidpointNearestEven)
}

/// Rounds a remaining life to 1 fractional digit, toward zero.
///
/// Remaining life is never rounded up: 0.16 years presents as 0.1, not 0.2.
#[must_use]
pub fn round_life_down(value: Decimal) -> Decimal {
    round_fixed(value, 1, RoundingStrategy::ToZero)
}

/// Rounds a dimensionless ratio (RSF, confidence) to `dp` digits, half-even.
#[must_use]
pub fn round_ratio(value: Decimal, dp: u32) -> Decimal {
    round_fixed(value, dp, RoundingStrategy::MidpointNearestEven)
}

/// Rounds to `dp` fractional digits and pins the scale so the canonical
/// string always carries exactly `dp` digits.
fn round_fixed(value: Decimal, dp: u32, strategy: RoundingStrategy) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, strategy);
    rounded.rescale(dp);
    rounded
}

/// Relative difference `|a - b| / max(|a|, |b|, EPSILON)`.
///
/// # Errors
///
/// Returns [`DecimalError`] if the intermediate arithmetic overflows.
pub fn relative_difference(a: Decimal, b: Decimal) -> Result<Decimal, DecimalError> {
    let diff = sub(a, b, "relative difference numerator")?.abs();
    let scale = a.abs().max(b.abs()).max(EPSILON);
    div(diff, scale, "relative difference denominator")
}

/// Canonical string form of a decimal: plain notation, scale preserved.
#[must_use]
pub fn canonical_string(value: Decimal) -> String {
    value.to_string()
}
