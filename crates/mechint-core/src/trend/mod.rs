//! Corrosion-trend regression and remaining-life projection.
//!
//! Consumes the chronological series of per-inspection minimum thicknesses
//! for one equipment item. Two points degrade to a point-to-point rate with
//! the classic 1.25x/0.75x confidence spread; three or more points get a
//! least-squares regression with slope standard error, and the
//! conservative/average/optimistic rates are `mean + k*SE` / `mean` /
//! `mean - k*SE` (k = 2.0 for n <= 30, 1.96 above).
//!
//! Remaining life is `(measuredMin - t_min) / rate`, rounded **down** to one
//! fractional digit. A non-positive numerator projects 0.0 years with an
//! unfit hint; a non-positive rate projects the `Indefinite` sentinel with a
//! warning; anything above the policy cap is clamped with a warning.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal;
use crate::error::ErrorKind;
use crate::model::{ConfidenceSelector, RemainingLife};
use crate::policy::Policy;

/// Seconds per Julian year.
const SECONDS_PER_YEAR: Decimal = dec!(31557600);

/// Spread factors applied when only two points exist.
const TWO_POINT_CONSERVATIVE_FACTOR: Decimal = dec!(1.25);
const TWO_POINT_OPTIMISTIC_FACTOR: Decimal = dec!(0.75);

/// One usable history point: the minimum thickness of one inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Inspection date.
    pub observed_at: DateTime<Utc>,
    /// Minimum measured thickness, inches.
    pub thickness: Decimal,
}

/// How the corrosion rate was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMethod {
    /// Simple difference between two inspections.
    PointToPoint,
    /// Least-squares regression over the full history.
    Regression,
}

/// Least-squares regression diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionSummary {
    /// Fitted slope of thickness against time, inches/year. Negative while
    /// the wall is thinning.
    pub slope_in_per_year: Decimal,
    /// Fitted thickness at the first inspection, inches.
    pub intercept: Decimal,
    /// Coefficient of determination in [0, 1].
    pub r_squared: Decimal,
    /// Standard error of the slope, inches/year.
    pub standard_error: Decimal,
    /// Number of points fitted.
    pub points: usize,
}

/// Conservative, average, and optimistic corrosion-rate estimates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEstimates {
    /// Highest plausible loss rate, inches/year.
    pub conservative: Decimal,
    /// Mean loss rate, inches/year.
    pub average: Decimal,
    /// Lowest plausible loss rate, inches/year.
    pub optimistic: Decimal,
    /// Derivation method.
    pub method: RateMethod,
    /// Regression diagnostics when the method was regression.
    pub regression: Option<RegressionSummary>,
}

impl RateEstimates {
    /// The rate selected by a confidence label.
    #[must_use]
    pub fn select(&self, confidence: ConfidenceSelector) -> Decimal {
        match confidence {
            ConfidenceSelector::Conservative => self.conservative,
            ConfidenceSelector::Average => self.average,
            ConfidenceSelector::Optimistic => self.optimistic,
        }
    }
}

/// A remaining-life projection with its attendant findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeProjection {
    /// The projected life.
    pub life: RemainingLife,
    /// Warnings raised while projecting.
    pub warnings: Vec<String>,
    /// Whether the projection implies the equipment is unfit.
    pub unfit: bool,
}

/// Estimates corrosion rates from at least two history points, oldest
/// first.
///
/// # Errors
///
/// - [`ErrorKind::Internal`] if fewer than two points are supplied; the
///   orchestrator gates on history length before calling.
/// - Arithmetic failures from the decimal kernel.
pub fn estimate_rates(history: &[HistoryPoint]) -> Result<RateEstimates, ErrorKind> {
    if history.len() < 2 {
        return Err(ErrorKind::Internal {
            detail: format!(
                "rate estimation requires at least 2 history points, got {}",
                history.len()
            ),
        });
    }

    if history.len() == 2 {
        return point_to_point(history[0], history[1]);
    }
    regression(history)
}

fn years_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Result<Decimal, ErrorKind> {
    let seconds = later.signed_duration_since(earlier).num_seconds();
    Ok(decimal::div(
        Decimal::from(seconds),
        SECONDS_PER_YEAR,
        "history span",
    )?)
}

fn point_to_point(earlier: HistoryPoint, later: HistoryPoint) -> Result<RateEstimates, ErrorKind> {
    let span = years_between(earlier.observed_at, later.observed_at)?;
    if span <= Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "point-to-point rate".to_string(),
            detail: "inspection dates are not strictly increasing".to_string(),
        });
    }

    let loss = decimal::sub(earlier.thickness, later.thickness, "point-to-point loss")?;
    let average = decimal::div(loss, span, "point-to-point rate")?;
    let conservative = decimal::mul(average, TWO_POINT_CONSERVATIVE_FACTOR, "conservative rate")?;
    let optimistic = decimal::mul(average, TWO_POINT_OPTIMISTIC_FACTOR, "optimistic rate")?;

    Ok(RateEstimates {
        // A negative (growing) average flips the factor ordering; keep the
        // conservative estimate the largest.
        conservative: conservative.max(optimistic).max(average),
        average,
        optimistic: optimistic.min(conservative).min(average),
        method: RateMethod::PointToPoint,
        regression: None,
    })
}

#[allow(clippy::too_many_lines)]
fn regression(history: &[HistoryPoint]) -> Result<RateEstimates, ErrorKind> {
    let n = Decimal::from(history.len());
    let first = history[0].observed_at;

    let mut xs = Vec::with_capacity(history.len());
    for point in history {
        xs.push(years_between(first, point.observed_at)?);
    }

    let mut sum_x = Decimal::ZERO;
    let mut sum_y = Decimal::ZERO;
    let mut sum_xy = Decimal::ZERO;
    let mut sum_xx = Decimal::ZERO;
    for (x, point) in xs.iter().zip(history) {
        sum_x = decimal::add(sum_x, *x, "regression sum x")?;
        sum_y = decimal::add(sum_y, point.thickness, "regression sum y")?;
        let xy = decimal::mul(*x, point.thickness, "regression xy")?;
        sum_xy = decimal::add(sum_xy, xy, "regression sum xy")?;
        let xx = decimal::mul(*x, *x, "regression xx")?;
        sum_xx = decimal::add(sum_xx, xx, "regression sum xx")?;
    }

    // slope = (n*Sxy - Sx*Sy) / (n*Sxx - Sx^2)
    let n_sxy = decimal::mul(n, sum_xy, "regression n*Sxy")?;
    let sx_sy = decimal::mul(sum_x, sum_y, "regression Sx*Sy")?;
    let numerator = decimal::sub(n_sxy, sx_sy, "regression slope numerator")?;
    let n_sxx = decimal::mul(n, sum_xx, "regression n*Sxx")?;
    let sx_sx = decimal::mul(sum_x, sum_x, "regression Sx^2")?;
    let denominator = decimal::sub(n_sxx, sx_sx, "regression slope denominator")?;
    if denominator <= Decimal::ZERO {
        return Err(ErrorKind::ArithmeticFailure {
            operation: "regression".to_string(),
            detail: "history points do not span time".to_string(),
        });
    }
    let slope = decimal::div(numerator, denominator, "regression slope")?;

    let mean_x = decimal::div(sum_x, n, "regression mean x")?;
    let mean_y = decimal::div(sum_y, n, "regression mean y")?;
    let slope_mean_x = decimal::mul(slope, mean_x, "regression slope*mean_x")?;
    let intercept = decimal::sub(mean_y, slope_mean_x, "regression intercept")?;

    // Residual and total sums of squares.
    let mut ss_res = Decimal::ZERO;
    let mut ss_tot = Decimal::ZERO;
    let mut sxx_centered = Decimal::ZERO;
    for (x, point) in xs.iter().zip(history) {
        let fitted = decimal::add(
            intercept,
            decimal::mul(slope, *x, "regression fitted term")?,
            "regression fitted",
        )?;
        let residual = decimal::sub(point.thickness, fitted, "regression residual")?;
        ss_res = decimal::add(
            ss_res,
            decimal::mul(residual, residual, "regression residual sq")?,
            "regression ss_res",
        )?;
        let centered_y = decimal::sub(point.thickness, mean_y, "regression centered y")?;
        ss_tot = decimal::add(
            ss_tot,
            decimal::mul(centered_y, centered_y, "regression centered y sq")?,
            "regression ss_tot",
        )?;
        let centered_x = decimal::sub(*x, mean_x, "regression centered x")?;
        sxx_centered = decimal::add(
            sxx_centered,
            decimal::mul(centered_x, centered_x, "regression centered x sq")?,
            "regression sxx",
        )?;
    }

    let r_squared = if ss_tot.is_zero() {
        Decimal::ONE
    } else {
        let fraction = decimal::div(ss_res, ss_tot, "regression r^2 fraction")?;
        decimal::sub(Decimal::ONE, fraction, "regression r^2")?
            .max(Decimal::ZERO)
            .min(Decimal::ONE)
    };

    let degrees = Decimal::from(history.len() - 2);
    let variance = decimal::div(ss_res, degrees, "regression residual variance")?;
    let residual_sd = variance.sqrt().ok_or(ErrorKind::ArithmeticFailure {
        operation: "regression".to_string(),
        detail: "negative residual variance".to_string(),
    })?;
    let sxx_root = sxx_centered.sqrt().ok_or(ErrorKind::ArithmeticFailure {
        operation: "regression".to_string(),
        detail: "negative x spread".to_string(),
    })?;
    let standard_error = decimal::div(residual_sd, sxx_root, "regression slope SE")?;

    // Loss rate is positive while the wall thins.
    let average = decimal::sub(Decimal::ZERO, slope, "loss rate")?;
    let k = if history.len() > 30 { dec!(1.96) } else { dec!(2.0) };
    let margin = decimal::mul(k, standard_error, "rate margin")?;
    let conservative = decimal::add(average, margin, "conservative rate")?;
    let optimistic = decimal::sub(average, margin, "optimistic rate")?;

    Ok(RateEstimates {
        conservative,
        average,
        optimistic,
        method: RateMethod::Regression,
        regression: Some(RegressionSummary {
            slope_in_per_year: slope,
            intercept,
            r_squared,
            standard_error,
            points: history.len(),
        }),
    })
}

/// Projects remaining life from the governing thickness, the minimum
/// required thickness, and a corrosion rate.
///
/// # Errors
///
/// Arithmetic failures from the decimal kernel.
pub fn project_remaining_life(
    measured_min: Decimal,
    minimum_required: Decimal,
    rate: Decimal,
    policy: &Policy,
) -> Result<LifeProjection, ErrorKind> {
    let margin = decimal::sub(measured_min, minimum_required, "remaining life margin")?;

    if margin <= Decimal::ZERO {
        return Ok(LifeProjection {
            life: RemainingLife::Finite(decimal::round_life_down(Decimal::ZERO)),
            warnings: vec![format!(
                "measured minimum {measured_min} in is at or below the minimum required \
                 {minimum_required} in"
            )],
            unfit: true,
        });
    }

    if rate <= Decimal::ZERO {
        return Ok(LifeProjection {
            life: RemainingLife::Indefinite,
            warnings: vec![format!(
                "corrosion rate {rate} in/yr is not positive; remaining life is indefinite"
            )],
            unfit: false,
        });
    }

    let raw_years = decimal::div(margin, rate, "remaining life")?;
    if raw_years > policy.remaining_life_cap_years {
        return Ok(LifeProjection {
            life: RemainingLife::Finite(decimal::round_life_down(policy.remaining_life_cap_years)),
            warnings: vec![format!(
                "projected life {raw_years} yr exceeds the {} yr cap",
                policy.remaining_life_cap_years
            )],
            unfit: false,
        });
    }

    Ok(LifeProjection {
        life: RemainingLife::Finite(decimal::round_life_down(raw_years)),
        warnings: Vec::new(),
        unfit: false,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    /// Exactly two Julian years, in seconds.
    const TWO_YEARS: i64 = 63_115_200;

    fn at(offset_seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_577_836_800 + offset_seconds, 0).unwrap()
    }

    fn point(offset_seconds: i64, thickness: Decimal) -> HistoryPoint {
        HistoryPoint {
            observed_at: at(offset_seconds),
            thickness,
        }
    }

    // =========================================================================
    // Rate estimation
    // =========================================================================

    #[test]
    fn point_to_point_rate_matches_hand_calculation() {
        let history = [point(0, dec!(0.4920)), point(TWO_YEARS, dec!(0.4780))];
        let rates = estimate_rates(&history).unwrap();
        assert_eq!(rates.average, dec!(0.0070));
        assert_eq!(rates.conservative, dec!(0.008750));
        assert_eq!(rates.optimistic, dec!(0.005250));
        assert_eq!(rates.method, RateMethod::PointToPoint);
        assert!(rates.regression.is_none());
    }

    #[test]
    fn perfectly_linear_history_regresses_exactly() {
        // 0.005 in/yr loss, sampled yearly for four years.
        let year = TWO_YEARS / 2;
        let history = [
            point(0, dec!(0.500)),
            point(year, dec!(0.495)),
            point(2 * year, dec!(0.490)),
            point(3 * year, dec!(0.485)),
            point(4 * year, dec!(0.480)),
        ];
        let rates = estimate_rates(&history).unwrap();
        let summary = rates.regression.as_ref().unwrap();
        assert_eq!(rates.average, dec!(0.005));
        assert_eq!(summary.standard_error, Decimal::ZERO);
        assert_eq!(summary.r_squared, Decimal::ONE);
        assert_eq!(rates.conservative, rates.average);
        assert_eq!(rates.optimistic, rates.average);
    }

    #[test]
    fn noisy_history_orders_estimates() {
        let year = TWO_YEARS / 2;
        let history = [
            point(0, dec!(0.5000)),
            point(year, dec!(0.4960)),
            point(2 * year, dec!(0.4900)),
            point(3 * year, dec!(0.4870)),
            point(4 * year, dec!(0.4800)),
        ];
        let rates = estimate_rates(&history).unwrap();
        assert!(rates.conservative >= rates.average);
        assert!(rates.average >= rates.optimistic);
        let summary = rates.regression.as_ref().unwrap();
        assert!(summary.standard_error > Decimal::ZERO);
        assert!(summary.r_squared > dec!(0.9));
    }

    #[test]
    fn growing_wall_yields_non_positive_average() {
        let history = [point(0, dec!(0.4780)), point(TWO_YEARS, dec!(0.4920))];
        let rates = estimate_rates(&history).unwrap();
        assert!(rates.average < Decimal::ZERO);
        assert!(rates.conservative >= rates.average);
    }

    #[test]
    fn single_point_history_is_refused() {
        let history = [point(0, dec!(0.4780))];
        let err = estimate_rates(&history).unwrap_err();
        assert_eq!(err.code(), "INTERNAL");
    }

    #[test]
    fn selector_picks_the_matching_estimate() {
        let history = [point(0, dec!(0.4920)), point(TWO_YEARS, dec!(0.4780))];
        let rates = estimate_rates(&history).unwrap();
        assert_eq!(rates.select(ConfidenceSelector::Conservative), rates.conservative);
        assert_eq!(rates.select(ConfidenceSelector::Average), rates.average);
        assert_eq!(rates.select(ConfidenceSelector::Optimistic), rates.optimistic);
    }

    // =========================================================================
    // Remaining life
    // =========================================================================

    #[test]
    fn remaining_life_rounds_down_to_one_digit() {
        // (0.220 - 0.212) / 0.050 = 0.16 -> 0.1 years.
        let projection =
            project_remaining_life(dec!(0.220), dec!(0.212), dec!(0.050), &Policy::default())
                .unwrap();
        assert_eq!(projection.life, RemainingLife::Finite(dec!(0.1)));
        assert!(!projection.unfit);
    }

    #[test]
    fn exhausted_wall_projects_zero_and_unfit() {
        let projection =
            project_remaining_life(dec!(0.210), dec!(0.212), dec!(0.005), &Policy::default())
                .unwrap();
        assert_eq!(projection.life, RemainingLife::Finite(dec!(0.0)));
        assert!(projection.unfit);
        assert_eq!(projection.warnings.len(), 1);
    }

    #[test]
    fn non_positive_rate_projects_indefinite_with_warning() {
        let projection =
            project_remaining_life(dec!(0.478), dec!(0.212), Decimal::ZERO, &Policy::default())
                .unwrap();
        assert_eq!(projection.life, RemainingLife::Indefinite);
        assert!(!projection.warnings.is_empty());
    }

    #[test]
    fn life_is_capped_at_policy_limit() {
        // (0.478 - 0.212) / 0.0001 = 2660 years.
        let projection =
            project_remaining_life(dec!(0.478), dec!(0.212), dec!(0.0001), &Policy::default())
                .unwrap();
        assert_eq!(projection.life, RemainingLife::Finite(dec!(100.0)));
        assert!(!projection.warnings.is_empty());
    }

    #[test]
    fn healthy_projection_matches_hand_calculation() {
        // (0.478 - 0.212) / 0.0070 = 38.0 years exactly.
        let projection =
            project_remaining_life(dec!(0.478), dec!(0.212), dec!(0.0070), &Policy::default())
                .unwrap();
        assert_eq!(projection.life, RemainingLife::Finite(dec!(38.0)));
        assert!(projection.warnings.is_empty());
    }
}
