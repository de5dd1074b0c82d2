//! Input validation: range checks, cross-field checks, sanitization, and
//! physical-plausibility screening.
//!
//! The validator never repairs an input. Every finding becomes a structured
//! [`ValidationIssue`] categorized [`Severity::Fatal`] or
//! [`Severity::Warning`]; fatals abort the job before any arithmetic runs,
//! warnings propagate into the result and the audit entry.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal;
use crate::material::ResolvedGeometry;
use crate::model::{InspectionRecord, Job};
use crate::policy::Policy;

/// Conservative whitelist for equipment tags and inspector certifications.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9\-_/ .]{1,64}$").expect("identifier pattern compiles"));

/// Pressure bounds accepted for Level 1 equipment, psi.
const PRESSURE_MIN: Decimal = dec!(-14.7);
const PRESSURE_MAX: Decimal = dec!(10000);

/// Temperature bounds accepted for Level 1 equipment, degrees Fahrenheit.
const TEMPERATURE_MIN: Decimal = dec!(-320);
const TEMPERATURE_MAX: Decimal = dec!(1500);

/// Minimum credible wall from the diameters, inches (1/16").
const MIN_WALL: Decimal = dec!(0.0625);

/// Minimum internal-to-external diameter ratio.
const MIN_DIAMETER_RATIO: Decimal = dec!(0.5);

/// Seconds per Julian year, used to convert date spans to years.
const SECONDS_PER_YEAR: Decimal = dec!(31557600);

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The job may proceed; the finding is recorded.
    Warning,
    /// The job aborts before arithmetic.
    Fatal,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted field path, e.g. `equipment.design_pressure`.
    pub field: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    fn fatal(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: Severity::Fatal,
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// All findings for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every issue found, in discovery order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether any fatal issue was found.
    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Fatal)
    }

    /// Warning messages, for propagation into the result.
    #[must_use]
    pub fn warning_messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect()
    }
}

/// Validates a job against the data-model invariants and cross-field rules.
///
/// `inspections` must already be sorted by date ascending; the orchestrator
/// does that before calling here.
#[must_use]
pub fn validate_job(job: &Job, geometry: &ResolvedGeometry, policy: &Policy) -> ValidationReport {
    let mut issues = Vec::new();

    validate_identifiers(job, &mut issues);
    validate_design_parameters(job, &mut issues);
    validate_geometry(geometry, &mut issues);
    validate_inspections(job, geometry, &mut issues);
    validate_observed_rates(&job.inspections, policy, &mut issues);

    ValidationReport { issues }
}

fn validate_identifiers(job: &Job, issues: &mut Vec<ValidationIssue>) {
    if !IDENTIFIER.is_match(&job.equipment.tag) {
        issues.push(ValidationIssue::fatal(
            "equipment.tag",
            "tag must match [A-Z0-9-_/ .]{1,64}",
        ));
    }
    for (idx, inspection) in job.inspections.iter().enumerate() {
        if !IDENTIFIER.is_match(&inspection.inspector_certification) {
            issues.push(ValidationIssue::fatal(
                &format!("inspections[{idx}].inspector_certification"),
                "certification must match [A-Z0-9-_/ .]{1,64}",
            ));
        }
    }
}

fn validate_design_parameters(job: &Job, issues: &mut Vec<ValidationIssue>) {
    let equipment = &job.equipment;

    if equipment.design_pressure < PRESSURE_MIN || equipment.design_pressure > PRESSURE_MAX {
        issues.push(ValidationIssue::fatal(
            "equipment.design_pressure",
            format!(
                "{} psi outside [{PRESSURE_MIN}, {PRESSURE_MAX}] psi",
                equipment.design_pressure
            ),
        ));
    } else if equipment.design_pressure <= Decimal::ZERO {
        issues.push(ValidationIssue::fatal(
            "equipment.design_pressure",
            "Level 1 internal-pressure assessment requires a positive design pressure",
        ));
    }

    if equipment.design_temperature < TEMPERATURE_MIN
        || equipment.design_temperature > TEMPERATURE_MAX
    {
        issues.push(ValidationIssue::fatal(
            "equipment.design_temperature",
            format!(
                "{} F outside [{TEMPERATURE_MIN}, {TEMPERATURE_MAX}] F",
                equipment.design_temperature
            ),
        ));
    }

    if equipment.nominal_thickness <= Decimal::ZERO {
        issues.push(ValidationIssue::fatal(
            "equipment.nominal_thickness",
            "nominal thickness must be positive",
        ));
    }

    if equipment.corrosion_allowance < Decimal::ZERO {
        issues.push(ValidationIssue::fatal(
            "equipment.corrosion_allowance",
            "corrosion allowance cannot be negative",
        ));
    }

    if equipment.joint_efficiency <= Decimal::ZERO || equipment.joint_efficiency > Decimal::ONE {
        issues.push(ValidationIssue::fatal(
            "equipment.joint_efficiency",
            "joint efficiency must lie in (0, 1]",
        ));
    }
}

fn validate_geometry(geometry: &ResolvedGeometry, issues: &mut Vec<ValidationIssue>) {
    if geometry.internal_diameter >= geometry.external_diameter {
        issues.push(ValidationIssue::fatal(
            "equipment.internal_diameter",
            "internal diameter must be smaller than external diameter",
        ));
        // The remaining geometry checks would only repeat this defect.
        return;
    }

    if geometry.wall_thickness < MIN_WALL {
        issues.push(ValidationIssue::fatal(
            "equipment.external_diameter",
            format!(
                "wall of {} in from the diameters is below the {MIN_WALL} in minimum",
                geometry.wall_thickness
            ),
        ));
    }

    if let Ok(ratio) = decimal::div(
        geometry.internal_diameter,
        geometry.external_diameter,
        "diameter ratio",
    ) {
        if ratio < MIN_DIAMETER_RATIO {
            issues.push(ValidationIssue::fatal(
                "equipment.internal_diameter",
                format!("diameter ratio {ratio} is below {MIN_DIAMETER_RATIO}"),
            ));
        }
    }
}

fn validate_inspections(
    job: &Job,
    geometry: &ResolvedGeometry,
    issues: &mut Vec<ValidationIssue>,
) {
    if job.inspections.is_empty() {
        issues.push(ValidationIssue::fatal(
            "inspections",
            "at least one inspection is required",
        ));
        return;
    }

    for (idx, inspection) in job.inspections.iter().enumerate() {
        if inspection.readings.is_empty() {
            issues.push(ValidationIssue::fatal(
                &format!("inspections[{idx}].readings"),
                "inspection carries no thickness readings",
            ));
            continue;
        }

        let mut seen_cmls = HashSet::new();
        for (ridx, reading) in inspection.readings.iter().enumerate() {
            let field = format!("inspections[{idx}].readings[{ridx}]");

            if !seen_cmls.insert(reading.cml_id.as_str()) {
                issues.push(ValidationIssue::fatal(
                    &field,
                    format!("duplicate CML id {}", reading.cml_id),
                ));
            }

            if reading.measured <= Decimal::ZERO {
                issues.push(ValidationIssue::fatal(
                    &field,
                    "measured thickness must be positive",
                ));
            } else if reading.measured >= geometry.internal_diameter {
                issues.push(ValidationIssue::fatal(
                    &field,
                    format!(
                        "measured thickness {} in is not below the internal diameter {} in",
                        reading.measured, geometry.internal_diameter
                    ),
                ));
            }

            if let Some(previous) = reading.previous_measured {
                if previous < reading.measured {
                    issues.push(ValidationIssue::warning(
                        &field,
                        format!(
                            "previous reading {previous} in is below the current {} in; \
                             apparent wall growth",
                            reading.measured
                        ),
                    ));
                }
            }
        }
    }
}

/// Screens point-to-point rates between consecutive inspection minima for
/// physically impossible values.
fn validate_observed_rates(
    inspections: &[InspectionRecord],
    policy: &Policy,
    issues: &mut Vec<ValidationIssue>,
) {
    let minima: Vec<_> = inspections
        .iter()
        .filter_map(|i| i.minimum_thickness().map(|t| (i.date, t)))
        .collect();

    for (idx, pair) in minima.windows(2).enumerate() {
        let (earlier_date, earlier) = pair[0];
        let (later_date, later) = pair[1];
        let field = format!("inspections[{}]", idx + 1);

        let span_seconds = later_date.signed_duration_since(earlier_date).num_seconds();
        if span_seconds <= 0 {
            issues.push(ValidationIssue::fatal(
                &field,
                "inspection dates must be strictly increasing",
            ));
            continue;
        }

        let Ok(years) = decimal::div(
            Decimal::from(span_seconds),
            SECONDS_PER_YEAR,
            "inspection span",
        ) else {
            continue;
        };
        let Ok(loss) = decimal::sub(earlier, later, "observed loss") else {
            continue;
        };
        let Ok(rate) = decimal::div(loss, years, "observed rate") else {
            continue;
        };

        if rate > policy.fatal_corrosion_rate {
            issues.push(ValidationIssue::fatal(
                &field,
                format!(
                    "observed corrosion rate {rate} in/yr exceeds the physical limit {} in/yr",
                    policy.fatal_corrosion_rate
                ),
            ));
        } else if rate > policy.warning_corrosion_rate {
            issues.push(ValidationIssue::warning(
                &field,
                format!(
                    "observed corrosion rate {rate} in/yr exceeds {} in/yr",
                    policy.warning_corrosion_rate
                ),
            ));
        }
    }
}
