//! Assessment orchestrator: wires the resolver, validator, calculator,
//! analyzer, RBI engine, and audit log for a single job.
//!
//! The orchestrator is a pure coordinator. It owns no session and no global
//! state; material lookup and audit append arrive as capabilities
//! ([`MaterialSource`], [`AuditStore`]) and the [`Policy`] value carries
//! every tunable. Each job runs to completion through the component chain
//! C2 -> C3 -> C5 (rates) -> C4 -> C5 (life) -> C6 -> C7; soft time budgets
//! and cancellation are honored only at component boundaries, and
//! cancellation is ignored once the audit append has begun. Exactly one
//! audit entry is appended per completed job.

pub mod pool;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditError, AuditStore, ChainVerification, NewAuditEntry};
use crate::calc;
use crate::decimal;
use crate::error::{Component, ErrorKind};
use crate::material::{MaterialSource, ResolvedGeometry, ResolvedProperties, resolve_geometry};
use crate::model::{
    AssessmentOutputs, CalculationResult, Fitness, InputSnapshot, Job, RemainingLife,
};
use crate::policy::{METHOD_VERSION, Policy, SOFTWARE_VERSION};
use crate::rbi;
use crate::trend::{self, HistoryPoint, RateEstimates};
use crate::validate::{Severity, ValidationIssue, validate_job};

/// Cooperative cancellation handle, checked at component boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The owning job stops at its next component
    /// boundary; a job past the audit append is final.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cumulative per-component time spent, checked against the soft budgets.
#[derive(Debug, Default)]
struct BudgetLedger {
    spent: [Duration; 6],
}

impl BudgetLedger {
    fn charge(
        &mut self,
        component: Component,
        elapsed: Duration,
        policy: &Policy,
    ) -> Result<(), ErrorKind> {
        let slot = &mut self.spent[component_index(component)];
        *slot += elapsed;
        if let Some(budget) = policy.budgets.for_component(component) {
            if *slot > budget {
                return Err(ErrorKind::BudgetExceeded {
                    component,
                    budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                    elapsed_ms: u64::try_from(slot.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
        Ok(())
    }
}

const fn component_index(component: Component) -> usize {
    match component {
        Component::PropertyResolver => 0,
        Component::Validator => 1,
        Component::Calculator => 2,
        Component::Analyzer => 3,
        Component::Rbi => 4,
        Component::Audit => 5,
    }
}

/// The assessment engine. Cheap to share behind an [`Arc`]; stateless
/// between jobs.
pub struct Assessor {
    materials: Arc<dyn MaterialSource>,
    audit: Arc<dyn AuditStore>,
    policy: Policy,
}

impl Assessor {
    /// Builds an assessor from its capabilities and policy.
    pub fn new(
        materials: Arc<dyn MaterialSource>,
        audit: Arc<dyn AuditStore>,
        policy: Policy,
    ) -> Self {
        Self {
            materials,
            audit,
            policy,
        }
    }

    /// The policy this assessor runs under.
    #[must_use]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Assesses one job to completion.
    ///
    /// # Errors
    ///
    /// Any [`ErrorKind`]; no error case yields a partial numeric answer and
    /// no audit entry is written for a failed job.
    pub fn assess(&self, job: &Job) -> Result<CalculationResult, ErrorKind> {
        self.assess_cancellable(job, &CancelToken::new())
    }

    /// Assesses one job, honoring `cancel` at component boundaries.
    ///
    /// # Errors
    ///
    /// As [`Assessor::assess`], plus [`ErrorKind::Cancelled`].
    #[allow(clippy::too_many_lines)]
    pub fn assess_cancellable(
        &self,
        job: &Job,
        cancel: &CancelToken,
    ) -> Result<CalculationResult, ErrorKind> {
        let calculation_id = Uuid::new_v4();
        tracing::info!(
            %calculation_id,
            tag = %job.equipment.tag,
            kind = job.equipment.kind.as_str(),
            "assessment started"
        );

        let mut ledger = BudgetLedger::default();
        let equipment = &job.equipment;

        // Inspections are processed oldest-first regardless of input order.
        let mut inspections = job.inspections.clone();
        inspections.sort_by_key(|i| i.date);
        let sorted_job = Job {
            equipment: equipment.clone(),
            inspections,
            options: job.options.clone(),
        };

        // C2: resolve properties and geometry.
        let (properties, geometry): (ResolvedProperties, ResolvedGeometry) =
            self.stage(&mut ledger, Component::PropertyResolver, cancel, || {
                let geometry = resolve_geometry(equipment)?;
                let properties = self
                    .materials
                    .resolve(&equipment.material, equipment.design_temperature)?;
                Ok((properties, geometry))
            })?;

        // C3: validate; fatal issues abort before any arithmetic.
        let report = self.stage(&mut ledger, Component::Validator, cancel, || {
            Ok(validate_job(&sorted_job, &geometry, &self.policy))
        })?;
        if report.has_fatal() {
            tracing::warn!(%calculation_id, issues = report.issues.len(), "validation failed");
            return Err(ErrorKind::InputInvalid {
                issues: report.issues,
            });
        }
        let mut warnings = report.warning_messages();

        let history: Vec<HistoryPoint> = sorted_job
            .inspections
            .iter()
            .filter_map(|i| {
                i.minimum_thickness().map(|thickness| HistoryPoint {
                    observed_at: i.date,
                    thickness,
                })
            })
            .collect();
        let governing = history.last().copied().ok_or_else(|| ErrorKind::Internal {
            detail: "no usable inspection after validation".to_string(),
        })?;
        let measured_min = governing.thickness;

        // C5, first half: corrosion rates when history allows a trend.
        let rates: Option<RateEstimates> = if history.len() >= 2 {
            Some(self.stage(&mut ledger, Component::Analyzer, cancel, || {
                trend::estimate_rates(&history)
            })?)
        } else {
            warnings.push(
                "single inspection on record; corrosion trend not established".to_string(),
            );
            None
        };

        let selected_rate = rates.as_ref().map(|r| {
            decimal::round_ratio(r.select(sorted_job.options.confidence), 6)
        });
        if let Some(rate) = selected_rate {
            self.screen_selected_rate(rate, &mut warnings)?;
        }

        // FCA projects the selected loss rate over the option horizon. A
        // negative (growing) rate contributes no allowance.
        let horizon = Decimal::from(sorted_job.options.future_corrosion_years);
        let fca = decimal::mul(
            selected_rate.unwrap_or(Decimal::ZERO).max(Decimal::ZERO),
            horizon,
            "future corrosion allowance",
        )?;

        // C4: dual-path t_min, MAWP, RSF.
        let (t_min, mawp, rsf) = self.stage(&mut ledger, Component::Calculator, cancel, || {
            calc::thin_wall_guard(geometry.wall_thickness, geometry.internal_radius, &self.policy)?;
            let t_min = calc::minimum_thickness(
                equipment.design_pressure,
                geometry.internal_radius,
                properties.allowable_stress,
                equipment.joint_efficiency,
                equipment.nominal_thickness,
                &self.policy,
            )?;
            let t_min_presented = decimal::round_thickness(t_min.accepted);

            let t_eff = decimal::sub(measured_min, fca, "effective thickness")?;
            let mawp = calc::mawp(
                t_eff,
                geometry.internal_radius,
                properties.allowable_stress,
                equipment.joint_efficiency,
                &self.policy,
            )?;
            let rsf = calc::remaining_strength_factor(
                measured_min,
                fca,
                t_min_presented,
                equipment.nominal_thickness,
                &self.policy,
            )?;
            Ok((t_min_presented, decimal::round_pressure(mawp.accepted), rsf))
        })?;
        let rsf_presented = decimal::round_ratio(rsf.accepted, 4);

        // C5, second half: remaining life from the governing thickness.
        let projection = self.stage(&mut ledger, Component::Analyzer, cancel, || {
            trend::project_remaining_life(
                measured_min,
                t_min,
                selected_rate.unwrap_or(Decimal::ZERO),
                &self.policy,
            )
        })?;
        warnings.extend(projection.warnings.iter().cloned());

        // C6: inspection interval and risk.
        let recommendation = self.stage(&mut ledger, Component::Rbi, cancel, || {
            rbi::recommend(
                equipment.kind,
                sorted_job.options.consequence,
                rsf_presented,
                projection.life,
                &self.policy,
            )
        })?;

        if rsf_presented < self.policy.rsf_action_threshold {
            warnings.push(format!(
                "RSF {rsf_presented} below {}; Level 2 or Level 3 assessment recommended",
                self.policy.rsf_action_threshold
            ));
        }

        let fitness = self.determine_fitness(rsf_presented, &projection);
        let assumptions = self.assumptions(fca, &sorted_job, &properties);
        let confidence = self.confidence_score(&sorted_job, history.len(), warnings.len());

        let outputs = AssessmentOutputs {
            t_min,
            mawp,
            rsf: rsf_presented,
            corrosion_rate_in_per_year: selected_rate,
            remaining_life: projection.life,
            next_inspection_years: recommendation.interval_years,
            fitness,
            risk: recommendation.risk,
            requires_immediate_review: recommendation.requires_immediate_review,
            confidence,
            warnings,
            assumptions,
            rationale: recommendation.rationale,
        };
        let inputs = InputSnapshot {
            equipment: equipment.clone(),
            measured_min,
            latest_inspection: governing.observed_at,
            history_points: history.len(),
            options: sorted_job.options.clone(),
        };

        // C7: exactly one audit append. Past this point the result is
        // final; cancellation is no longer consulted.
        if cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled {
                component: Component::Audit,
            });
        }
        let entry = self.append_audit(calculation_id, &sorted_job, &inputs, &outputs)?;

        tracing::info!(
            %calculation_id,
            seq_id = entry.seq_id,
            rsf = %rsf_presented,
            fitness = ?fitness,
            risk = ?recommendation.risk,
            "assessment complete"
        );

        Ok(CalculationResult {
            calculation_id,
            performed_at: entry.performed_at,
            inputs,
            outputs,
        })
    }

    /// Fetches the audit entry for a calculation.
    ///
    /// # Errors
    ///
    /// Maps store failures into [`ErrorKind`].
    pub fn audit_entry(&self, calculation_id: Uuid) -> Result<Option<AuditEntry>, ErrorKind> {
        self.audit
            .entry_for(calculation_id)
            .map_err(map_audit_error)
    }

    /// Verifies the audit chain from `from_seq` to the head.
    ///
    /// # Errors
    ///
    /// Maps store failures into [`ErrorKind`]; a broken chain is a
    /// successful verification result.
    pub fn verify_audit(&self, from_seq: u64) -> Result<ChainVerification, ErrorKind> {
        self.audit.verify(from_seq).map_err(map_audit_error)
    }

    fn stage<T>(
        &self,
        ledger: &mut BudgetLedger,
        component: Component,
        cancel: &CancelToken,
        body: impl FnOnce() -> Result<T, ErrorKind>,
    ) -> Result<T, ErrorKind> {
        if cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled { component });
        }
        let started = Instant::now();
        let out = body()?;
        ledger.charge(component, started.elapsed(), &self.policy)?;
        Ok(out)
    }

    /// Final plausibility screen on the rate actually selected for
    /// projection; the validator has already screened observed rates.
    fn screen_selected_rate(
        &self,
        rate: Decimal,
        warnings: &mut Vec<String>,
    ) -> Result<(), ErrorKind> {
        if rate > self.policy.fatal_corrosion_rate {
            return Err(ErrorKind::InputInvalid {
                issues: vec![ValidationIssue {
                    field: "corrosion_rate".to_string(),
                    severity: Severity::Fatal,
                    message: format!(
                        "selected corrosion rate {rate} in/yr exceeds the physical limit {} in/yr",
                        self.policy.fatal_corrosion_rate
                    ),
                }],
            });
        }
        if rate > self.policy.warning_corrosion_rate {
            warnings.push(format!(
                "selected corrosion rate {rate} in/yr exceeds {} in/yr",
                self.policy.warning_corrosion_rate
            ));
        }
        Ok(())
    }

    fn determine_fitness(&self, rsf: Decimal, projection: &trend::LifeProjection) -> Fitness {
        if projection.unfit || rsf < self.policy.rsf_unfit_threshold {
            return Fitness::Unfit;
        }
        if let RemainingLife::Finite(years) = projection.life {
            if years < dec!(1) {
                return Fitness::Unfit;
            }
        }
        if rsf < self.policy.rsf_action_threshold {
            return Fitness::Conditional;
        }
        Fitness::Fit
    }

    fn assumptions(
        &self,
        fca: Decimal,
        job: &Job,
        properties: &ResolvedProperties,
    ) -> Vec<String> {
        vec![
            "circumferential stress formula governs (most conservative)".to_string(),
            "uniform metal loss across the shell".to_string(),
            "linear corrosion rate, no acceleration credit".to_string(),
            format!(
                "future corrosion allowance {fca} in over a {} yr horizon",
                job.options.future_corrosion_years
            ),
            format!(
                "allowable stress {} psi from {} table {} ({} edition) at {} F",
                properties.allowable_stress,
                properties.provenance.source_document,
                properties.provenance.table,
                properties.provenance.edition_year,
                properties.temperature
            ),
        ]
    }

    /// Confidence starts at 1.0 and loses fixed penalties per data gap and
    /// per warning, floored by policy. Fewer than two history points cap
    /// the score outright.
    fn confidence_score(&self, job: &Job, history_points: usize, warning_count: usize) -> Decimal {
        let mut score = Decimal::ONE;

        let latest_missing_previous = job
            .inspections
            .last()
            .is_some_and(|i| i.readings.iter().any(|r| r.previous_measured.is_none()));
        if latest_missing_previous {
            score -= dec!(0.10);
        }
        if history_points < 3 {
            score -= dec!(0.15);
        }
        if history_points < 5 {
            score -= dec!(0.05);
        }
        score -= dec!(0.05) * Decimal::from(warning_count);

        if history_points < 2 {
            score = score.min(self.policy.sparse_history_confidence_cap);
        }
        decimal::round_ratio(score.max(self.policy.confidence_floor), 2)
    }

    fn append_audit(
        &self,
        calculation_id: Uuid,
        job: &Job,
        inputs: &InputSnapshot,
        outputs: &AssessmentOutputs,
    ) -> Result<AuditEntry, ErrorKind> {
        let inputs_value = serde_json::to_value(inputs).map_err(|e| ErrorKind::Internal {
            detail: format!("input snapshot serialization: {e}"),
        })?;
        let outputs_value = serde_json::to_value(outputs).map_err(|e| ErrorKind::Internal {
            detail: format!("output snapshot serialization: {e}"),
        })?;

        self.audit
            .append(NewAuditEntry {
                calculation_id,
                performer: job.options.performer.clone(),
                software_version: SOFTWARE_VERSION.to_string(),
                calculation_method_version: METHOD_VERSION.to_string(),
                inputs: inputs_value,
                outputs: outputs_value,
            })
            .map_err(map_audit_error)
    }
}

fn map_audit_error(err: AuditError) -> ErrorKind {
    match err {
        AuditError::Immutable { detail } => ErrorKind::AuditImmutableViolation { detail },
        other => ErrorKind::Internal {
            detail: other.to_string(),
        },
    }
}
