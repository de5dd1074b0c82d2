//! Immutable assessment policy.
//!
//! Safety factors, statutory caps, tolerances, and rounding thresholds are
//! carried by a [`Policy`] value injected into the orchestrator. There is no
//! process-wide singleton and nothing here is mutable at runtime; a caller
//! that needs different numbers constructs a different `Policy`.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::Component;
use crate::model::{ConsequenceTier, EquipmentKind};

/// Software version recorded in every audit entry.
pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Calculation method version recorded in every audit entry.
pub const METHOD_VERSION: &str = "api579-level1/1.0.0";

/// Per-component soft time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    /// Budget for property resolution.
    pub property_resolver: Duration,
    /// Budget for input validation.
    pub validator: Duration,
    /// Budget for the dual-path calculator (closed-form plus iterative).
    pub calculator: Duration,
    /// Budget for trend regression and life projection.
    pub analyzer: Duration,
    /// Budget for the RBI interval engine.
    pub rbi: Duration,
}

impl StageBudgets {
    /// Budget for a given component. The audit append has no soft budget;
    /// once entered it runs to completion.
    #[must_use]
    pub const fn for_component(&self, component: Component) -> Option<Duration> {
        match component {
            Component::PropertyResolver => Some(self.property_resolver),
            Component::Validator => Some(self.validator),
            Component::Calculator => Some(self.calculator),
            Component::Analyzer => Some(self.analyzer),
            Component::Rbi => Some(self.rbi),
            Component::Audit => None,
        }
    }
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            property_resolver: Duration::from_millis(50),
            validator: Duration::from_millis(50),
            calculator: Duration::from_millis(50),
            analyzer: Duration::from_millis(100),
            rbi: Duration::from_millis(50),
        }
    }
}

/// Level-1 assessment policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Relative tolerance for dual-path reconciliation.
    pub dual_path_tolerance: Decimal,
    /// Thin-wall validity limit on `t/R`; above this the job is rejected
    /// with `ThickWallOutOfScope`.
    pub thin_wall_limit: Decimal,
    /// Absolute convergence tolerance for thickness bisection, in inches.
    pub thickness_bisection_tolerance: Decimal,
    /// Absolute convergence tolerance for pressure bisection, in psi.
    pub pressure_bisection_tolerance: Decimal,
    /// Iteration cap for all bisection loops.
    pub max_bisection_iterations: u32,
    /// Remaining life is capped here and a warning is attached.
    pub remaining_life_cap_years: Decimal,
    /// Corrosion rates above this are physically impossible and fatal.
    pub fatal_corrosion_rate: Decimal,
    /// Corrosion rates above this draw a warning.
    pub warning_corrosion_rate: Decimal,
    /// RSF below this raises risk to at least Medium.
    pub rsf_monitor_threshold: Decimal,
    /// RSF below this caps the inspection interval and raises risk to at
    /// least High.
    pub rsf_action_threshold: Decimal,
    /// RSF below this marks the equipment unfit.
    pub rsf_unfit_threshold: Decimal,
    /// Interval cap applied when RSF falls below the action threshold.
    pub rsf_capped_interval_years: Decimal,
    /// Remaining life below this forces Critical risk and immediate review.
    pub critical_life_years: Decimal,
    /// Inspection intervals never drop below this floor.
    pub interval_floor_years: Decimal,
    /// Minimum confidence score after penalties.
    pub confidence_floor: Decimal,
    /// Confidence ceiling applied when fewer than two history points exist.
    pub sparse_history_confidence_cap: Decimal,
    /// Per-component soft budgets.
    pub budgets: StageBudgets,
    /// Worker tasks in the assessment pool.
    pub pool_workers: usize,
    /// Bounded FIFO depth for jobs waiting on the pool.
    pub pool_queue_depth: usize,
}

impl Policy {
    /// Statutory inspection interval cap for an equipment kind, in years.
    #[must_use]
    pub fn statutory_cap_years(&self, kind: EquipmentKind) -> Decimal {
        match kind {
            EquipmentKind::Vessel | EquipmentKind::Tank | EquipmentKind::Exchanger => dec!(10),
            EquipmentKind::Piping => dec!(5),
        }
    }

    /// Consequence-of-failure weighting applied to the base interval.
    #[must_use]
    pub fn consequence_weight(&self, tier: ConsequenceTier) -> Decimal {
        match tier {
            ConsequenceTier::Low => dec!(1.0),
            ConsequenceTier::Medium => dec!(0.75),
            ConsequenceTier::High => dec!(0.5),
            ConsequenceTier::Critical => dec!(0.25),
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            dual_path_tolerance: dec!(0.001),
            thin_wall_limit: dec!(0.1),
            thickness_bisection_tolerance: dec!(0.000001),
            pressure_bisection_tolerance: dec!(0.000001),
            max_bisection_iterations: 200,
            remaining_life_cap_years: dec!(100),
            fatal_corrosion_rate: dec!(0.5),
            warning_corrosion_rate: dec!(0.05),
            rsf_monitor_threshold: dec!(0.95),
            rsf_action_threshold: dec!(0.90),
            rsf_unfit_threshold: dec!(0.80),
            rsf_capped_interval_years: dec!(2.0),
            critical_life_years: dec!(2),
            interval_floor_years: dec!(0.25),
            confidence_floor: dec!(0.50),
            sparse_history_confidence_cap: dec!(0.75),
            budgets: StageBudgets::default(),
            pool_workers: 4,
            pool_queue_depth: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statutory_caps_match_level_one_policy() {
        let policy = Policy::default();
        assert_eq!(policy.statutory_cap_years(EquipmentKind::Vessel), dec!(10));
        assert_eq!(policy.statutory_cap_years(EquipmentKind::Piping), dec!(5));
        assert_eq!(policy.statutory_cap_years(EquipmentKind::Tank), dec!(10));
        assert_eq!(
            policy.statutory_cap_years(EquipmentKind::Exchanger),
            dec!(10)
        );
    }

    #[test]
    fn consequence_weights_are_monotone() {
        let policy = Policy::default();
        let weights = [
            policy.consequence_weight(ConsequenceTier::Low),
            policy.consequence_weight(ConsequenceTier::Medium),
            policy.consequence_weight(ConsequenceTier::High),
            policy.consequence_weight(ConsequenceTier::Critical),
        ];
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn audit_has_no_soft_budget() {
        let budgets = StageBudgets::default();
        assert!(budgets.for_component(Component::Audit).is_none());
        assert!(budgets.for_component(Component::Calculator).is_some());
    }
}
