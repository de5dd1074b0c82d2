//! Dual-path calculator for the Level 1 safety formulas.
//!
//! Every safety quantity is computed by two independent paths and
//! reconciled before a number is released:
//!
//! - **t_min**: closed form `P·R / (S·E − 0.6·P)` against bisection of
//!   `P = S·E·t / (R + 0.6·t)` on `[0.001, 2·nominal]`.
//! - **MAWP**: closed form `S·E·t_eff / (R + 0.6·t_eff)` against bisection
//!   on pressure until `t_min(P) = t_eff`.
//! - **RSF**: one defined formula (API 579 Part 5 Eq. 5.5), direct
//!   expression against the rearranged metal-loss form. The FCA treatment
//!   is identical in both paths by construction.
//!
//! Reconciliation accepts the conservative minimum when the relative
//! difference is within tolerance and otherwise fails with
//! [`ErrorKind::DualPathDivergence`] carrying both values; a disagreeing
//! pair never produces a safety number. The calculator is stateless and
//! never retries.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decimal::{self, relative_difference};
use crate::error::ErrorKind;
use crate::policy::Policy;

/// Shell-formula constant `0.6` from ASME VIII Div. 1 UG-27.
const SHELL_FACTOR: Decimal = dec!(0.6);

/// A reconciled dual-path result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualPathValue {
    /// The accepted (conservative) value: `min(primary, secondary)`.
    pub accepted: Decimal,
    /// The primary path's value.
    pub primary: Decimal,
    /// The secondary path's value.
    pub secondary: Decimal,
    /// The observed relative difference.
    pub relative_difference: Decimal,
}

/// Reconciles a primary/secondary pair.
///
/// # Errors
///
/// [`ErrorKind::DualPathDivergence`] when the relative difference exceeds
/// `tolerance`.
pub fn reconcile(
    quantity: &str,
    primary: Decimal,
    secondary: Decimal,
    tolerance: Decimal,
) -> Result<DualPathValue, ErrorKind> {
    let relative = relative_difference(primary, secondary)?;
    if relative > tolerance {
        return Err(ErrorKind::DualPathDivergence {
            quantity: quantity.to_string(),
            primary,
            secondary,
            relative_difference: relative,
            tolerance,
        });
    }
    Ok(DualPathValue {
        accepted: primary.min(secondary),
        primary,
        secondary,
        relative_difference: relative,
    })
}

/// Rejects the thick-wall regime before any shell formula runs.
///
/// Returns the observed `t/R` ratio on success.
///
/// # Errors
///
/// [`ErrorKind::ThickWallOutOfScope`] when `wall / radius` exceeds the
/// policy limit. The caller must escalate to a Level 2/3 assessment; the
/// calculator never silently switches formula.
pub fn thin_wall_guard(
    wall: Decimal,
    radius: Decimal,
    policy: &Policy,
) -> Result<Decimal, ErrorKind> {
    let ratio = decimal::div(wall, radius, "t/R ratio")?;
    if ratio > policy.thin_wall_limit {
        return Err(ErrorKind::ThickWallOutOfScope {
            ratio,
            limit: policy.thin_wall_limit,
        });
    }
    Ok(ratio)
}

/// Minimum required thickness for a cylindrical shell, circumferential
/// stress governing.
///
/// # Errors
///
/// - [`ErrorKind::ArithmeticFailure`] when `S·E − 0.6·P` is not positive
///   (pressure too high for the material) or the bisection bracket cannot
///   contain the root.
/// - [`ErrorKind::DualPathDivergence`] when the two paths disagree.
pub fn minimum_thickness(
    pressure: Decimal,
    radius: Decimal,
    stress: Decimal,
    efficiency: Decimal,
    nominal_thickness: Decimal,
    policy: &Policy,
) -> Result<DualPathValue, ErrorKind> {
    let stress_term = decimal::mul(stress, efficiency, "t_min stress term")?;
    let pressure_term = decimal::mul(SHELL_FACTOR, pressure, "t_min pressure term")?;
    let denominator = decimal::sub(stress_term, pressure_term, "t_min denominator")?;
    if denominator <= Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "t_min closed form".to_string(),
            detail: format!(
                "pressure too high for material: S*E = {stress_term} psi, 0.6*P = {pressure_term} psi"
            ),
        });
    }

    let numerator = decimal::mul(pressure, radius, "t_min numerator")?;
    let primary = decimal::div(numerator, denominator, "t_min closed form")?;

    let secondary = thickness_by_bisection(pressure, radius, stress_term, nominal_thickness, policy)?;

    reconcile("t_min", primary, secondary, policy.dual_path_tolerance)
}

/// Secondary t_min path: bisection on `f(t) = S·E·t − P·(R + 0.6·t)` over
/// `[0.001, 2·nominal]`.
fn thickness_by_bisection(
    pressure: Decimal,
    radius: Decimal,
    stress_term: Decimal,
    nominal_thickness: Decimal,
    policy: &Policy,
) -> Result<Decimal, ErrorKind> {
    let residual = |t: Decimal| -> Result<Decimal, ErrorKind> {
        let supplied = decimal::mul(stress_term, t, "t_min bisection supplied")?;
        let shell = decimal::mul(SHELL_FACTOR, t, "t_min bisection shell term")?;
        let geometry = decimal::add(radius, shell, "t_min bisection geometry")?;
        let demanded = decimal::mul(pressure, geometry, "t_min bisection demanded")?;
        Ok(decimal::sub(supplied, demanded, "t_min bisection residual")?)
    };

    let mut lo = dec!(0.001);
    let mut hi = decimal::mul(nominal_thickness, dec!(2), "t_min bracket")?;

    if residual(lo)? >= Decimal::ZERO {
        // Root sits below the measurable bracket; the closed form will land
        // in the same region or the reconciliation will refuse the pair.
        return Ok(lo);
    }
    if residual(hi)? < Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "t_min bisection".to_string(),
            detail: format!(
                "required thickness exceeds the bisection bracket of {hi} in"
            ),
        });
    }

    for _ in 0..policy.max_bisection_iterations {
        let width = decimal::sub(hi, lo, "t_min bracket width")?;
        if width <= policy.thickness_bisection_tolerance {
            break;
        }
        let mid = midpoint(lo, hi)?;
        if residual(mid)? >= Decimal::ZERO {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    midpoint(lo, hi)
}

/// Maximum allowable working pressure on the effective thickness
/// `t_eff = measuredMin − FCA`.
///
/// # Errors
///
/// - [`ErrorKind::ArithmeticFailure`] when no thickness remains after the
///   future corrosion allowance.
/// - [`ErrorKind::DualPathDivergence`] when the two paths disagree.
pub fn mawp(
    effective_thickness: Decimal,
    radius: Decimal,
    stress: Decimal,
    efficiency: Decimal,
    policy: &Policy,
) -> Result<DualPathValue, ErrorKind> {
    if effective_thickness <= Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "mawp".to_string(),
            detail: format!(
                "no thickness remains after future corrosion allowance: t_eff = {effective_thickness} in"
            ),
        });
    }

    let stress_term = decimal::mul(stress, efficiency, "mawp stress term")?;
    let numerator = decimal::mul(stress_term, effective_thickness, "mawp numerator")?;
    let shell = decimal::mul(SHELL_FACTOR, effective_thickness, "mawp shell term")?;
    let denominator = decimal::add(radius, shell, "mawp denominator")?;
    let primary = decimal::div(numerator, denominator, "mawp closed form")?;

    let secondary =
        pressure_by_bisection(effective_thickness, radius, stress_term, policy)?;

    reconcile("mawp", primary, secondary, policy.dual_path_tolerance)
}

/// Secondary MAWP path: bisection on pressure over `[0, S·E]` until the
/// thickness demanded by `P` matches the effective thickness, i.e. the root
/// of `g(P) = P·(R + 0.6·t_eff) − t_eff·S·E`.
fn pressure_by_bisection(
    effective_thickness: Decimal,
    radius: Decimal,
    stress_term: Decimal,
    policy: &Policy,
) -> Result<Decimal, ErrorKind> {
    let shell = decimal::mul(SHELL_FACTOR, effective_thickness, "mawp bisection shell term")?;
    let geometry = decimal::add(radius, shell, "mawp bisection geometry")?;
    let target = decimal::mul(effective_thickness, stress_term, "mawp bisection target")?;

    let residual = |p: Decimal| -> Result<Decimal, ErrorKind> {
        let demanded = decimal::mul(p, geometry, "mawp bisection demanded")?;
        Ok(decimal::sub(demanded, target, "mawp bisection residual")?)
    };

    let mut lo = Decimal::ZERO;
    let mut hi = stress_term;

    if residual(hi)? < Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "mawp bisection".to_string(),
            detail: format!("allowable pressure exceeds the stress bound of {hi} psi"),
        });
    }

    for _ in 0..policy.max_bisection_iterations {
        let width = decimal::sub(hi, lo, "mawp bracket width")?;
        if width <= policy.pressure_bisection_tolerance {
            break;
        }
        let mid = midpoint(lo, hi)?;
        if residual(mid)? >= Decimal::ZERO {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    midpoint(lo, hi)
}

/// Remaining strength factor per API 579 Part 5 Eq. 5.5, clamped to
/// `[0, 1]`.
///
/// Primary path evaluates the direct expression
/// `(t_mm − FCA − t_min) / (t_nom − t_min)`; the secondary path evaluates
/// the rearranged metal-loss form
/// `1 − ((t_nom − t_mm) + FCA) / (t_nom − t_min)`. Both subtract the same
/// FCA from the same numerator; any asymmetry between the paths is a
/// defect, not redundancy.
///
/// # Errors
///
/// - [`ErrorKind::ArithmeticFailure`] when the nominal thickness does not
///   exceed the minimum required thickness.
/// - [`ErrorKind::DualPathDivergence`] when the two paths disagree.
pub fn remaining_strength_factor(
    measured_min: Decimal,
    future_corrosion_allowance: Decimal,
    minimum_required: Decimal,
    nominal_thickness: Decimal,
    policy: &Policy,
) -> Result<DualPathValue, ErrorKind> {
    let margin = decimal::sub(nominal_thickness, minimum_required, "rsf margin")?;
    if margin <= Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "rsf".to_string(),
            detail: format!(
                "nominal thickness {nominal_thickness} in does not exceed the minimum \
                 required {minimum_required} in"
            ),
        });
    }

    // Direct expression.
    let available = decimal::sub(measured_min, future_corrosion_allowance, "rsf available")?;
    let numerator = decimal::sub(available, minimum_required, "rsf numerator")?;
    let primary = clamp_unit(decimal::div(numerator, margin, "rsf direct")?);

    // Rearranged metal-loss form.
    let metal_loss = decimal::sub(nominal_thickness, measured_min, "rsf metal loss")?;
    let total_loss = decimal::add(metal_loss, future_corrosion_allowance, "rsf total loss")?;
    let loss_fraction = decimal::div(total_loss, margin, "rsf loss fraction")?;
    let secondary = clamp_unit(decimal::sub(Decimal::ONE, loss_fraction, "rsf rearranged")?);

    reconcile("rsf", primary, secondary, policy.dual_path_tolerance)
}

fn clamp_unit(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

fn midpoint(lo: Decimal, hi: Decimal) -> Result<Decimal, ErrorKind> {
    let sum = decimal::add(lo, hi, "bisection midpoint")?;
    Ok(decimal::div(sum, dec!(2), "bisection midpoint")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::default()
    }

    // =========================================================================
    // t_min
    // =========================================================================

    #[test]
    fn minimum_thickness_matches_hand_calculation() {
        // t_min = (150 * 24) / (20000 * 0.85 - 0.6 * 150) = 3600 / 16910.
        let result =
            minimum_thickness(dec!(150), dec!(24), dec!(20000), dec!(0.85), dec!(0.500), &policy())
                .unwrap();
        let expected = dec!(3600) / dec!(16910);
        assert_eq!(result.primary, expected);
        assert_eq!(
            crate::decimal::round_thickness(result.accepted),
            dec!(0.2129)
        );
    }

    #[test]
    fn minimum_thickness_paths_agree_within_tolerance() {
        let result =
            minimum_thickness(dec!(150), dec!(24), dec!(20000), dec!(0.85), dec!(0.500), &policy())
                .unwrap();
        assert!(result.relative_difference <= policy().dual_path_tolerance);
        assert!(result.accepted <= result.primary);
        assert!(result.accepted <= result.secondary);
    }

    #[test]
    fn excessive_pressure_fails_closed_form_domain() {
        // S*E = 17000; 0.6*P = 18000.
        let err =
            minimum_thickness(dec!(30000), dec!(24), dec!(20000), dec!(0.85), dec!(0.500), &policy())
                .unwrap_err();
        assert_eq!(err.code(), "ARITHMETIC_FAILURE");
    }

    #[test]
    fn undersized_bracket_is_reported() {
        // Nominal of 0.1 in cannot bracket a t_min of ~0.21 in.
        let err =
            minimum_thickness(dec!(150), dec!(24), dec!(20000), dec!(0.85), dec!(0.100), &policy())
                .unwrap_err();
        assert_eq!(err.code(), "ARITHMETIC_FAILURE");
    }

    // =========================================================================
    // MAWP
    // =========================================================================

    #[test]
    fn mawp_matches_hand_calculation() {
        // MAWP = 17000 * 0.408 / (24 + 0.6 * 0.408) = 6936 / 24.2448.
        let result = mawp(dec!(0.408), dec!(24), dec!(20000), dec!(0.85), &policy()).unwrap();
        let expected = dec!(6936) / dec!(24.2448);
        assert_eq!(result.primary, expected);
        assert_eq!(crate::decimal::round_pressure(result.accepted), dec!(286.08));
    }

    #[test]
    fn mawp_paths_agree_within_tolerance() {
        let result = mawp(dec!(0.408), dec!(24), dec!(20000), dec!(0.85), &policy()).unwrap();
        assert!(result.relative_difference <= policy().dual_path_tolerance);
    }

    #[test]
    fn mawp_without_remaining_thickness_fails() {
        let err = mawp(dec!(-0.05), dec!(24), dec!(20000), dec!(0.85), &policy()).unwrap_err();
        assert_eq!(err.code(), "ARITHMETIC_FAILURE");
    }

    // =========================================================================
    // RSF
    // =========================================================================

    #[test]
    fn rsf_direct_and_rearranged_agree() {
        let result = remaining_strength_factor(
            dec!(0.478),
            dec!(0.070),
            dec!(0.2129),
            dec!(0.500),
            &policy(),
        )
        .unwrap();
        // The two paths may differ only in the last working digits.
        assert!(result.relative_difference <= dec!(0.0000000000000000000001));
        // (0.478 - 0.070 - 0.2129) / (0.500 - 0.2129) = 0.1951 / 0.2871.
        let expected = dec!(0.1951) / dec!(0.2871);
        assert_eq!(
            crate::decimal::round_ratio(result.accepted, 4),
            crate::decimal::round_ratio(expected, 4)
        );
    }

    #[test]
    fn rsf_clamps_to_zero_when_fca_consumes_the_wall() {
        let result = remaining_strength_factor(
            dec!(0.230),
            dec!(0.300),
            dec!(0.2129),
            dec!(0.500),
            &policy(),
        )
        .unwrap();
        assert_eq!(result.accepted, Decimal::ZERO);
    }

    #[test]
    fn rsf_clamps_to_one_for_uncorroded_wall() {
        let result = remaining_strength_factor(
            dec!(0.500),
            Decimal::ZERO,
            dec!(0.2129),
            dec!(0.500),
            &policy(),
        )
        .unwrap();
        assert_eq!(result.accepted, Decimal::ONE);
    }

    #[test]
    fn rsf_requires_nominal_above_minimum() {
        let err = remaining_strength_factor(
            dec!(0.478),
            dec!(0.070),
            dec!(0.500),
            dec!(0.500),
            &policy(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "ARITHMETIC_FAILURE");
    }

    // =========================================================================
    // Reconciliation and thin-wall guard
    // =========================================================================

    #[test]
    fn reconciliation_accepts_the_conservative_minimum() {
        let result = reconcile("t_min", dec!(0.21290), dec!(0.21288), dec!(0.001)).unwrap();
        assert_eq!(result.accepted, dec!(0.21288));
    }

    #[test]
    fn divergence_carries_both_values() {
        let err = reconcile("t_min", dec!(0.2129), dec!(0.3000), dec!(0.001)).unwrap_err();
        match err {
            ErrorKind::DualPathDivergence {
                quantity,
                primary,
                secondary,
                ..
            } => {
                assert_eq!(quantity, "t_min");
                assert_eq!(primary, dec!(0.2129));
                assert_eq!(secondary, dec!(0.3000));
            },
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn corrupted_bisection_bracket_is_caught_by_reconciliation() {
        // Simulate a defective secondary path converging to the wrong value:
        // reconciliation must refuse the pair rather than pick one.
        let primary = dec!(3600) / dec!(16910);
        let wrong_secondary = dec!(0.3500);
        let err = reconcile("t_min", primary, wrong_secondary, dec!(0.001)).unwrap_err();
        assert_eq!(err.code(), "DUAL_PATH_DIVERGENCE");
    }

    #[test]
    fn agreement_of_zeroes_is_accepted() {
        let result = reconcile("rsf", Decimal::ZERO, Decimal::ZERO, dec!(0.001)).unwrap();
        assert_eq!(result.accepted, Decimal::ZERO);
        assert_eq!(result.relative_difference, Decimal::ZERO);
    }

    #[test]
    fn thick_wall_is_rejected_not_switched() {
        // ID = 2.0, OD = 3.0: wall 0.5 in on a 1.0 in radius.
        let err = thin_wall_guard(dec!(0.5), dec!(1.0), &policy()).unwrap_err();
        match err {
            ErrorKind::ThickWallOutOfScope { ratio, .. } => assert_eq!(ratio, dec!(0.5)),
            other => panic!("expected thick-wall rejection, got {other:?}"),
        }
    }

    #[test]
    fn thin_wall_passes_the_guard() {
        let ratio = thin_wall_guard(dec!(0.5), dec!(24), &policy()).unwrap();
        assert!(ratio <= policy().thin_wall_limit);
    }

    mod proptest_reconcile {
        use proptest::prelude::*;

        use super::*;

        fn arb_positive() -> impl Strategy<Value = Decimal> {
            (1i64..100_000_000, 0u32..7).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn prop_reconcile_is_symmetric(a in arb_positive(), b in arb_positive()) {
                let forward = reconcile("q", a, b, dec!(0.001));
                let backward = reconcile("q", b, a, dec!(0.001));
                match (forward, backward) {
                    (Ok(x), Ok(y)) => {
                        prop_assert_eq!(x.accepted, y.accepted);
                        prop_assert_eq!(x.relative_difference, y.relative_difference);
                    },
                    (Err(_), Err(_)) => {},
                    (x, y) => prop_assert!(false, "asymmetric outcome: {:?} vs {:?}", x, y),
                }
            }

            #[test]
            fn prop_accepted_value_is_never_above_either_path(
                a in arb_positive(),
                b in arb_positive(),
            ) {
                if let Ok(value) = reconcile("q", a, b, dec!(0.001)) {
                    prop_assert!(value.accepted <= a);
                    prop_assert!(value.accepted <= b);
                    prop_assert!(value.relative_difference <= dec!(0.001));
                }
            }

            #[test]
            fn prop_rsf_stays_in_the_unit_interval(
                measured in (1000i64..6000).prop_map(|m| Decimal::new(m, 4)),
                fca in (0i64..2000).prop_map(|m| Decimal::new(m, 4)),
            ) {
                // Fixed t_min/nominal; measured and FCA sweep the envelope.
                let result = remaining_strength_factor(
                    measured,
                    fca,
                    dec!(0.2129),
                    dec!(0.500),
                    &Policy::default(),
                );
                if let Ok(value) = result {
                    prop_assert!(value.accepted >= Decimal::ZERO);
                    prop_assert!(value.accepted <= Decimal::ONE);
                }
            }
        }
    }
}
