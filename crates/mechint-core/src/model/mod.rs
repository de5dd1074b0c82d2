//! Core data model: equipment, inspections, assessment options, results.
//!
//! All safety quantities are [`Decimal`] and serialize as their canonical
//! string form; JSON numbers are never used for them. Timestamps are UTC.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of pressure equipment covered by a Level 1 assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EquipmentKind {
    /// Pressure vessel (API 510).
    Vessel,
    /// Atmospheric or low-pressure storage tank (API 653).
    Tank,
    /// Process piping (API 570).
    Piping,
    /// Shell-and-tube heat exchanger.
    Exchanger,
}

impl EquipmentKind {
    /// Stable name for logs and serialized records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vessel => "vessel",
            Self::Tank => "tank",
            Self::Piping => "piping",
            Self::Exchanger => "exchanger",
        }
    }
}

/// Reference to an ASME material specification and grade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialRef {
    /// Specification, e.g. `SA-516`.
    pub specification: String,
    /// Grade within the specification, e.g. `70`.
    pub grade: String,
}

impl MaterialRef {
    /// Builds a reference from specification and grade.
    pub fn new(specification: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            specification: specification.into(),
            grade: grade.into(),
        }
    }

    /// Combined designation, e.g. `SA-516-70`.
    #[must_use]
    pub fn designation(&self) -> String {
        format!("{}-{}", self.specification, self.grade)
    }
}

/// In-service equipment identity, design parameters, and geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Equipment tag, e.g. `V-101`.
    pub tag: String,
    /// Equipment kind.
    pub kind: EquipmentKind,
    /// Design pressure in psi.
    pub design_pressure: Decimal,
    /// Design temperature in degrees Fahrenheit.
    pub design_temperature: Decimal,
    /// Nominal (as-built) wall thickness in inches.
    pub nominal_thickness: Decimal,
    /// Design corrosion allowance in inches.
    pub corrosion_allowance: Decimal,
    /// Joint efficiency factor, `0 < E <= 1`.
    pub joint_efficiency: Decimal,
    /// Material reference.
    pub material: MaterialRef,
    /// Internal diameter in inches. Required for all Level 1 kinds.
    pub internal_diameter: Option<Decimal>,
    /// External diameter in inches.
    pub external_diameter: Option<Decimal>,
    /// Overall length in inches, where applicable.
    pub length: Option<Decimal>,
}

/// A single wall-thickness reading at a condition monitoring location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThicknessReading {
    /// CML identifier, unique within one inspection.
    pub cml_id: String,
    /// Physical location description.
    pub location: String,
    /// Measured thickness in inches, 4-digit precision.
    pub measured: Decimal,
    /// Reading at the same CML from the prior inspection, if known.
    pub previous_measured: Option<Decimal>,
}

/// One periodic inspection: a dated, certified set of thickness readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    /// When the inspection was performed.
    pub date: DateTime<Utc>,
    /// Inspector certification identifier.
    pub inspector_certification: String,
    /// Ordered thickness readings.
    pub readings: Vec<ThicknessReading>,
}

impl InspectionRecord {
    /// Minimum measured thickness across all readings, if any exist.
    #[must_use]
    pub fn minimum_thickness(&self) -> Option<Decimal> {
        self.readings.iter().map(|r| r.measured).min()
    }
}

/// Corrosion-rate confidence selector.
///
/// `nominal` is deliberately not a variant: one boundary of the source
/// system advertised it while another required `average`, so this core
/// rejects it and surfaces the mismatch instead of aliasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSelector {
    /// Highest plausible rate; shortest life. The default.
    #[default]
    Conservative,
    /// Regression mean rate.
    Average,
    /// Lowest plausible rate; longest life.
    Optimistic,
}

impl ConfidenceSelector {
    /// Parses a confidence label.
    ///
    /// # Errors
    ///
    /// Returns a message naming the accepted labels. `nominal` gets a
    /// dedicated message so the caller can route it to the product owner.
    pub fn parse(label: &str) -> Result<Self, String> {
        match label {
            "conservative" => Ok(Self::Conservative),
            "average" => Ok(Self::Average),
            "optimistic" => Ok(Self::Optimistic),
            "nominal" => Err(
                "confidence label 'nominal' is not accepted; use 'average' \
                 (accepted: conservative, average, optimistic)"
                    .to_string(),
            ),
            other => Err(format!(
                "unknown confidence label '{other}' (accepted: conservative, average, optimistic)"
            )),
        }
    }
}

/// Consequence-of-failure tier for the RBI weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsequenceTier {
    /// Low consequence of failure.
    Low,
    /// Medium consequence of failure. The default.
    #[default]
    Medium,
    /// High consequence of failure.
    High,
    /// Critical consequence of failure.
    Critical,
}

/// Assessment level. Only Level 1 is in scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AssessmentLevel {
    /// API 579 Level 1 screening assessment.
    #[default]
    Level1,
}

/// Options supplied with a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentOptions {
    /// Corrosion-rate confidence selector.
    pub confidence: ConfidenceSelector,
    /// Horizon in years for the future corrosion allowance.
    pub future_corrosion_years: u32,
    /// Assessment level.
    pub assessment_level: AssessmentLevel,
    /// Consequence-of-failure tier.
    pub consequence: ConsequenceTier,
    /// Engineer or system performing the calculation, recorded in the audit
    /// entry.
    pub performer: String,
}

impl Default for AssessmentOptions {
    fn default() -> Self {
        Self {
            confidence: ConfidenceSelector::Conservative,
            future_corrosion_years: 10,
            assessment_level: AssessmentLevel::Level1,
            consequence: ConsequenceTier::Medium,
            performer: "mechint-core".to_string(),
        }
    }
}

/// A complete assessment job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// The equipment under assessment.
    pub equipment: Equipment,
    /// Inspection history, oldest first or not; the orchestrator sorts.
    pub inspections: Vec<InspectionRecord>,
    /// Assessment options.
    pub options: AssessmentOptions,
}

/// Fitness-for-service determination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fitness {
    /// Fit for continued service.
    Fit,
    /// Fit with monitoring; Level 2/3 assessment recommended.
    Conditional,
    /// Not fit for continued service.
    Unfit,
}

/// Risk level per the simplified API 580 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

/// Projected remaining life.
///
/// A non-positive corrosion rate yields [`RemainingLife::Indefinite`]: a
/// sentinel, never an infinity, always accompanied by a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingLife {
    /// Finite life in years, rounded down to one fractional digit.
    Finite(Decimal),
    /// No finite projection; corrosion rate was zero or negative.
    Indefinite,
}

impl RemainingLife {
    /// The finite value, if any.
    #[must_use]
    pub const fn finite(self) -> Option<Decimal> {
        match self {
            Self::Finite(years) => Some(years),
            Self::Indefinite => None,
        }
    }
}

/// Snapshot of every input that influenced a calculation, embedded in the
/// result and hashed into the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    /// The equipment record as supplied.
    pub equipment: Equipment,
    /// Governing minimum measured thickness, in inches.
    pub measured_min: Decimal,
    /// Date of the governing (latest) inspection.
    pub latest_inspection: DateTime<Utc>,
    /// Number of usable history points for trending.
    pub history_points: usize,
    /// Options as supplied.
    pub options: AssessmentOptions,
}

/// Computed outputs of one assessment. Two byte-identical jobs produce two
/// byte-identical `AssessmentOutputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentOutputs {
    /// Minimum required thickness, inches, 4 digits.
    pub t_min: Decimal,
    /// Maximum allowable working pressure, psi, 2 digits.
    pub mawp: Decimal,
    /// Remaining strength factor in [0, 1], 4 digits.
    pub rsf: Decimal,
    /// Selected corrosion rate in inches/year, if history allowed one.
    pub corrosion_rate_in_per_year: Option<Decimal>,
    /// Projected remaining life.
    pub remaining_life: RemainingLife,
    /// Recommended next inspection interval in years.
    pub next_inspection_years: Decimal,
    /// Fitness determination.
    pub fitness: Fitness,
    /// Risk level.
    pub risk: RiskLevel,
    /// Whether an immediate engineering review is required.
    pub requires_immediate_review: bool,
    /// Confidence score in [0.50, 1.00], 2 digits.
    pub confidence: Decimal,
    /// Warnings accumulated across all components.
    pub warnings: Vec<String>,
    /// Conservative assumptions made during calculation.
    pub assumptions: Vec<String>,
    /// RBI rationale lines.
    pub rationale: Vec<String>,
}

/// The result returned by the orchestrator for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Unique id for this calculation; keys the audit entry.
    pub calculation_id: Uuid,
    /// When the calculation was performed.
    pub performed_at: DateTime<Utc>,
    /// Input snapshot.
    pub inputs: InputSnapshot,
    /// Computed outputs.
    pub outputs: AssessmentOutputs,
}
