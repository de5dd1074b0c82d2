//! Error taxonomy for the assessment core.
//!
//! Every failure that can cross the orchestrator boundary is a variant of
//! [`ErrorKind`] with a stable machine-readable code (see
//! [`ErrorKind::code`]) and a human-readable detail. No error case ever
//! yields a best-effort numeric answer; the orchestrator never swallows a
//! safety-related failure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::DecimalError;
use crate::validate::ValidationIssue;

/// Pipeline components, used for budget accounting and cancellation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Component {
    /// Material and geometry resolution (C2).
    PropertyResolver,
    /// Input validation (C3).
    Validator,
    /// Dual-path calculator (C4).
    Calculator,
    /// Corrosion trend and remaining-life analysis (C5).
    Analyzer,
    /// Risk-based inspection interval engine (C6).
    Rbi,
    /// Audit log append (C7).
    Audit,
}

impl Component {
    /// Stable name for logs and error details.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PropertyResolver => "property_resolver",
            Self::Validator => "validator",
            Self::Calculator => "calculator",
            Self::Analyzer => "analyzer",
            Self::Rbi => "rbi",
            Self::Audit => "audit",
        }
    }
}

/// Failure kinds reported by the assessment core.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// The validator rejected the job with one or more fatal issues.
    #[error("input validation failed with {} fatal issue(s)", issues.len())]
    InputInvalid {
        /// Every issue found, fatal and warning alike.
        issues: Vec<ValidationIssue>,
    },

    /// A material or geometry property is absent or unresolvable.
    #[error("property missing: {detail}")]
    PropertyMissing {
        /// What could not be resolved.
        detail: String,
    },

    /// The requested temperature lies outside the material table coverage.
    #[error(
        "design temperature {requested} F outside {material} coverage [{low} F, {high} F]"
    )]
    OutOfMaterialRange {
        /// Material designation, e.g. `SA-516-70`.
        material: String,
        /// Requested temperature in degrees Fahrenheit.
        requested: Decimal,
        /// Lowest tabulated temperature.
        low: Decimal,
        /// Highest tabulated temperature.
        high: Decimal,
    },

    /// The thin-wall assumption does not hold (`t/R > 0.1`); Level 1 scope
    /// ends here and the caller must escalate.
    #[error("thick-wall regime out of scope: t/R = {ratio} exceeds {limit}")]
    ThickWallOutOfScope {
        /// Observed wall-thickness-to-radius ratio.
        ratio: Decimal,
        /// The configured thin-wall limit.
        limit: Decimal,
    },

    /// Primary and secondary calculation paths disagree beyond tolerance.
    /// No safety number is returned.
    #[error(
        "dual-path divergence on {quantity}: primary {primary}, secondary {secondary}, \
         relative difference {relative_difference} > {tolerance}"
    )]
    DualPathDivergence {
        /// The quantity being reconciled, e.g. `t_min`.
        quantity: String,
        /// Value from the primary (closed-form) path.
        primary: Decimal,
        /// Value from the secondary (independent) path.
        secondary: Decimal,
        /// Observed relative difference.
        relative_difference: Decimal,
        /// Tolerance that was exceeded.
        tolerance: Decimal,
    },

    /// Decimal precision overflow.
    #[error("precision loss in {operation}")]
    PrecisionLoss {
        /// The arithmetic operation that overflowed.
        operation: String,
    },

    /// Arithmetic failure such as division by zero or an invalid formula
    /// domain.
    #[error("arithmetic failure in {operation}: {detail}")]
    ArithmeticFailure {
        /// The operation that failed.
        operation: String,
        /// What went wrong.
        detail: String,
    },

    /// A per-component soft budget was exceeded; the job aborts before the
    /// audit append.
    #[error("{component:?} exceeded its budget of {budget_ms} ms ({elapsed_ms} ms elapsed)")]
    BudgetExceeded {
        /// The component that overran.
        component: Component,
        /// Configured budget in milliseconds.
        budget_ms: u64,
        /// Observed elapsed time in milliseconds.
        elapsed_ms: u64,
    },

    /// An attempt was made to mutate or delete an audit entry.
    #[error("audit immutability violation: {detail}")]
    AuditImmutableViolation {
        /// What was attempted.
        detail: String,
    },

    /// The job was cancelled at a component boundary.
    #[error("cancelled before {component:?}")]
    Cancelled {
        /// The component the job would have entered next.
        component: Component,
    },

    /// Last-resort failure; never used for domain reasons.
    #[error("internal error: {detail}")]
    Internal {
        /// Diagnostic detail.
        detail: String,
    },
}

impl ErrorKind {
    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid { .. } => "INPUT_INVALID",
            Self::PropertyMissing { .. } => "PROPERTY_MISSING",
            Self::OutOfMaterialRange { .. } => "OUT_OF_MATERIAL_RANGE",
            Self::ThickWallOutOfScope { .. } => "THICK_WALL_OUT_OF_SCOPE",
            Self::DualPathDivergence { .. } => "DUAL_PATH_DIVERGENCE",
            Self::PrecisionLoss { .. } => "PRECISION_LOSS",
            Self::ArithmeticFailure { .. } => "ARITHMETIC_FAILURE",
            Self::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            Self::AuditImmutableViolation { .. } => "AUDIT_IMMUTABLE_VIOLATION",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

impl From<DecimalError> for ErrorKind {
    fn from(err: DecimalError) -> Self {
        match err {
            DecimalError::DivisionByZero { operation } => Self::ArithmeticFailure {
                operation: operation.to_string(),
                detail: "division by zero".to_string(),
            },
            DecimalError::Overflow { operation } => Self::PrecisionLoss {
                operation: operation.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = ErrorKind::ThickWallOutOfScope {
            ratio: dec!(0.5),
            limit: dec!(0.1),
        };
        assert_eq!(err.code(), "THICK_WALL_OUT_OF_SCOPE");
    }

    #[test]
    fn decimal_errors_map_to_taxonomy() {
        let div: ErrorKind = DecimalError::DivisionByZero { operation: "x" }.into();
        assert_eq!(div.code(), "ARITHMETIC_FAILURE");

        let overflow: ErrorKind = DecimalError::Overflow { operation: "x" }.into();
        assert_eq!(overflow.code(), "PRECISION_LOSS");
    }

    #[test]
    fn divergence_detail_carries_both_values() {
        let err = ErrorKind::DualPathDivergence {
            quantity: "t_min".to_string(),
            primary: dec!(0.2129),
            secondary: dec!(0.3000),
            relative_difference: dec!(0.29),
            tolerance: dec!(0.001),
        };
        let text = err.to_string();
        assert!(text.contains("0.2129"));
        assert!(text.contains("0.3000"));
    }
}
