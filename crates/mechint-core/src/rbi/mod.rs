//! Risk-based inspection interval engine (API 580/581, Level 1
//! simplification).
//!
//! Base interval is `min(remainingLife / 2, statutoryCap[kind])`. Risk
//! modifiers then apply: an RSF below the action threshold caps the interval
//! at two years and raises risk to at least High; a remaining life under two
//! years forces Critical risk and an immediate-review flag. The consequence
//! tier weights the interval, the result is rounded down to the nearest
//! half year, and the floor of a quarter year is applied last so a weighted
//! sub-half-year interval recommends 0.25 years rather than zero.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal;
use crate::error::ErrorKind;
use crate::model::{ConsequenceTier, EquipmentKind, RemainingLife, RiskLevel};
use crate::policy::Policy;

/// Inspection interval recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecommendation {
    /// Recommended interval until the next inspection, years.
    pub interval_years: Decimal,
    /// Overall risk level.
    pub risk: RiskLevel,
    /// Whether the finding requires immediate engineering review.
    pub requires_immediate_review: bool,
    /// Why the interval came out the way it did.
    pub rationale: Vec<String>,
}

/// Derives the inspection interval and risk level for a completed
/// calculation.
///
/// # Errors
///
/// Arithmetic failures from the decimal kernel.
pub fn recommend(
    kind: EquipmentKind,
    consequence: ConsequenceTier,
    rsf: Decimal,
    remaining_life: RemainingLife,
    policy: &Policy,
) -> Result<IntervalRecommendation, ErrorKind> {
    let mut rationale = Vec::new();
    let mut risk = RiskLevel::Low;
    let mut requires_immediate_review = false;

    let cap = policy.statutory_cap_years(kind);
    let mut interval = match remaining_life {
        RemainingLife::Finite(years) => {
            let half_life = decimal::div(years, dec!(2), "half life")?;
            rationale.push(format!(
                "base interval min({half_life} yr half-life, {cap} yr statutory cap for {})",
                kind.as_str()
            ));
            half_life.min(cap)
        },
        RemainingLife::Indefinite => {
            rationale.push(format!(
                "no finite remaining life; statutory cap of {cap} yr for {} governs",
                kind.as_str()
            ));
            cap
        },
    };

    // Risk from the remaining strength factor.
    if rsf < policy.rsf_unfit_threshold {
        risk = risk.max(RiskLevel::Critical);
        rationale.push(format!(
            "RSF {rsf} below {}; equipment unfit",
            policy.rsf_unfit_threshold
        ));
    } else if rsf < policy.rsf_action_threshold {
        risk = risk.max(RiskLevel::High);
        rationale.push(format!(
            "RSF {rsf} below {}",
            policy.rsf_action_threshold
        ));
    } else if rsf < policy.rsf_monitor_threshold {
        risk = risk.max(RiskLevel::Medium);
        rationale.push(format!(
            "RSF {rsf} below {}",
            policy.rsf_monitor_threshold
        ));
    }

    if rsf < policy.rsf_action_threshold && interval > policy.rsf_capped_interval_years {
        interval = policy.rsf_capped_interval_years;
        rationale.push(format!(
            "interval capped at {} yr by RSF below {}",
            policy.rsf_capped_interval_years, policy.rsf_action_threshold
        ));
    }

    // Risk from remaining life.
    if let RemainingLife::Finite(years) = remaining_life {
        if years < policy.critical_life_years {
            risk = RiskLevel::Critical;
            requires_immediate_review = true;
            rationale.push(format!(
                "remaining life {years} yr below {} yr; immediate review required",
                policy.critical_life_years
            ));
        }
    }

    // Consequence weighting, then the rounding ladder.
    let weight = policy.consequence_weight(consequence);
    interval = decimal::mul(interval, weight, "consequence weighting")?;
    rationale.push(format!("consequence weighting {weight} applied"));

    interval = round_down_half_year(interval)?;
    if interval < policy.interval_floor_years {
        interval = policy.interval_floor_years;
        rationale.push(format!(
            "interval raised to the {} yr floor",
            policy.interval_floor_years
        ));
    }

    Ok(IntervalRecommendation {
        interval_years: interval,
        risk,
        requires_immediate_review,
        rationale,
    })
}

/// Rounds an interval down to the nearest 0.5 year.
fn round_down_half_year(value: Decimal) -> Result<Decimal, ErrorKind> {
    let doubled = decimal::mul(value, dec!(2), "interval rounding")?;
    Ok(decimal::div(doubled.floor(), dec!(2), "interval rounding")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::default()
    }

    #[test]
    fn healthy_vessel_gets_weighted_statutory_cap() {
        // Life 38.0 yr: min(19.0, 10) = 10; Medium consequence -> 7.5 yr.
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Medium,
            dec!(0.9478),
            RemainingLife::Finite(dec!(38.0)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(7.5));
        assert_eq!(rec.risk, RiskLevel::Medium);
        assert!(!rec.requires_immediate_review);
    }

    #[test]
    fn low_consequence_keeps_the_full_cap() {
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Low,
            dec!(0.99),
            RemainingLife::Finite(dec!(38.0)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(10.0));
        assert_eq!(rec.risk, RiskLevel::Low);
    }

    #[test]
    fn piping_cap_is_five_years() {
        let rec = recommend(
            EquipmentKind::Piping,
            ConsequenceTier::Low,
            dec!(0.99),
            RemainingLife::Finite(dec!(40.0)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(5.0));
    }

    #[test]
    fn low_rsf_caps_interval_and_raises_risk() {
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Low,
            dec!(0.85),
            RemainingLife::Finite(dec!(20.0)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(2.0));
        assert_eq!(rec.risk, RiskLevel::High);
        assert!(!rec.requires_immediate_review);
    }

    #[test]
    fn short_life_is_critical_with_immediate_review() {
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Medium,
            dec!(0.44),
            RemainingLife::Finite(dec!(0.1)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.risk, RiskLevel::Critical);
        assert!(rec.requires_immediate_review);
        // 0.05 half-life weighted 0.75 rounds to zero, then the floor holds.
        assert_eq!(rec.interval_years, dec!(0.25));
    }

    #[test]
    fn indefinite_life_uses_the_statutory_cap() {
        let rec = recommend(
            EquipmentKind::Tank,
            ConsequenceTier::Low,
            dec!(1.00),
            RemainingLife::Indefinite,
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(10.0));
        assert_eq!(rec.risk, RiskLevel::Low);
    }

    #[test]
    fn interval_rounds_down_to_half_years() {
        // Life 15.6: half 7.8, cap 10 -> 7.8; High consequence 0.5 -> 3.9
        // -> rounds down to 3.5.
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::High,
            dec!(0.99),
            RemainingLife::Finite(dec!(15.6)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(3.5));
    }

    #[test]
    fn critical_consequence_quarters_the_interval() {
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Critical,
            dec!(0.99),
            RemainingLife::Finite(dec!(38.0)),
            &policy(),
        )
        .unwrap();
        assert_eq!(rec.interval_years, dec!(2.5));
    }

    #[test]
    fn rationale_names_every_applied_rule() {
        let rec = recommend(
            EquipmentKind::Vessel,
            ConsequenceTier::Medium,
            dec!(0.85),
            RemainingLife::Finite(dec!(1.0)),
            &policy(),
        )
        .unwrap();
        let text = rec.rationale.join("\n");
        assert!(text.contains("base interval"));
        assert!(text.contains("RSF"));
        assert!(text.contains("immediate review"));
        assert!(text.contains("consequence weighting"));
    }
}
