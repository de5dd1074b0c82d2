//! End-to-end assessment scenarios: one healthy vessel, the degraded
//! variants, the rejection paths, and audit-chain tamper detection.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use mechint_core::assess::Assessor;
use mechint_core::audit::{AuditStore, ChainVerification, SqliteAuditStore};
use mechint_core::calc;
use mechint_core::error::ErrorKind;
use mechint_core::material::AsmeSectionIIDTable;
use mechint_core::model::{
    AssessmentOptions, CalculationResult, ConfidenceSelector, ConsequenceTier, Equipment,
    EquipmentKind, Fitness, InspectionRecord, Job, MaterialRef, RemainingLife, RiskLevel,
    ThicknessReading,
};
use mechint_core::policy::Policy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Two Julian years, in seconds.
const TWO_YEARS: i64 = 63_115_200;

fn at(offset_seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_577_836_800 + offset_seconds, 0).unwrap()
}

fn vessel() -> Equipment {
    Equipment {
        tag: "V-101".to_string(),
        kind: EquipmentKind::Vessel,
        design_pressure: dec!(150),
        design_temperature: dec!(300),
        nominal_thickness: dec!(0.500),
        corrosion_allowance: dec!(0.125),
        joint_efficiency: dec!(0.85),
        material: MaterialRef::new("SA-516", "70"),
        internal_diameter: Some(dec!(48.00)),
        external_diameter: Some(dec!(49.00)),
        length: None,
    }
}

fn inspection(offset_seconds: i64, measured: Decimal, previous: Option<Decimal>) -> InspectionRecord {
    InspectionRecord {
        date: at(offset_seconds),
        inspector_certification: "API-510-12345".to_string(),
        readings: vec![ThicknessReading {
            cml_id: "CML-01".to_string(),
            location: "SHELL NORTH".to_string(),
            measured,
            previous_measured: previous,
        }],
    }
}

fn options(consequence: ConsequenceTier) -> AssessmentOptions {
    AssessmentOptions {
        confidence: ConfidenceSelector::Average,
        consequence,
        ..AssessmentOptions::default()
    }
}

fn assessor() -> (Assessor, Arc<SqliteAuditStore>) {
    let audit = Arc::new(SqliteAuditStore::in_memory().expect("in-memory audit store"));
    let assessor = Assessor::new(
        Arc::new(AsmeSectionIIDTable),
        Arc::clone(&audit) as Arc<dyn AuditStore>,
        Policy::default(),
    );
    (assessor, audit)
}

fn healthy_job() -> Job {
    Job {
        equipment: vessel(),
        inspections: vec![
            inspection(0, dec!(0.4980), None),
            inspection(TWO_YEARS, dec!(0.4960), Some(dec!(0.4980))),
        ],
        options: options(ConsequenceTier::Medium),
    }
}

#[test]
fn healthy_vessel_is_fit_with_a_weighted_interval() {
    let (assessor, _audit) = assessor();
    let result = assessor.assess(&healthy_job()).expect("assessment succeeds");
    let outputs = &result.outputs;

    assert_eq!(outputs.t_min, dec!(0.2129));
    assert_eq!(outputs.corrosion_rate_in_per_year, Some(dec!(0.001000)));
    assert_eq!(outputs.rsf, dec!(0.9512));
    assert_eq!(outputs.mawp, dec!(340.12));
    // Raw projection of 283 years is capped with a warning.
    assert_eq!(outputs.remaining_life, RemainingLife::Finite(dec!(100.0)));
    assert_eq!(outputs.next_inspection_years, dec!(7.5));
    assert_eq!(outputs.risk, RiskLevel::Low);
    assert_eq!(outputs.fitness, Fitness::Fit);
    assert!(!outputs.requires_immediate_review);
    assert_eq!(outputs.confidence, dec!(0.75));
}

#[test]
fn borderline_rsf_caps_the_interval_at_two_years() {
    let (assessor, _audit) = assessor();
    let job = Job {
        equipment: vessel(),
        inspections: vec![
            inspection(0, dec!(0.4620), None),
            inspection(TWO_YEARS, dec!(0.4600), Some(dec!(0.4620))),
        ],
        options: options(ConsequenceTier::Low),
    };
    let result = assessor.assess(&job).expect("assessment succeeds");
    let outputs = &result.outputs;

    assert_eq!(outputs.rsf, dec!(0.8258));
    assert_eq!(outputs.fitness, Fitness::Conditional);
    assert_eq!(outputs.risk, RiskLevel::High);
    assert_eq!(outputs.next_inspection_years, dec!(2.0));
    assert!(!outputs.requires_immediate_review);
    assert!(
        outputs.warnings.iter().any(|w| w.contains("below 0.90")),
        "warnings: {:?}",
        outputs.warnings
    );
}

#[test]
fn critical_life_forces_immediate_review() {
    let (assessor, _audit) = assessor();
    let job = Job {
        equipment: vessel(),
        inspections: vec![
            inspection(0, dec!(0.3200), None),
            inspection(TWO_YEARS, dec!(0.2200), Some(dec!(0.3200))),
        ],
        options: AssessmentOptions {
            confidence: ConfidenceSelector::Average,
            consequence: ConsequenceTier::Medium,
            future_corrosion_years: 0,
            ..AssessmentOptions::default()
        },
    };
    let result = assessor.assess(&job).expect("assessment succeeds");
    let outputs = &result.outputs;

    // (0.2200 - 0.2129) / 0.050 = 0.142 -> rounded down to 0.1 years.
    assert_eq!(outputs.remaining_life, RemainingLife::Finite(dec!(0.1)));
    assert_eq!(outputs.fitness, Fitness::Unfit);
    assert_eq!(outputs.risk, RiskLevel::Critical);
    assert!(outputs.requires_immediate_review);
    assert_eq!(outputs.next_inspection_years, dec!(0.25));
}

#[test]
fn thick_wall_geometry_is_rejected_without_an_audit_entry() {
    let (assessor, audit) = assessor();
    let job = Job {
        equipment: Equipment {
            tag: "P-7".to_string(),
            kind: EquipmentKind::Piping,
            design_pressure: dec!(150),
            design_temperature: dec!(300),
            nominal_thickness: dec!(0.500),
            corrosion_allowance: dec!(0.0625),
            joint_efficiency: dec!(1.0),
            material: MaterialRef::new("SA-106", "B"),
            internal_diameter: Some(dec!(2.0)),
            external_diameter: Some(dec!(3.0)),
            length: None,
        },
        inspections: vec![inspection(0, dec!(0.4500), None)],
        options: options(ConsequenceTier::Medium),
    };

    let err = assessor.assess(&job).expect_err("thick wall must be rejected");
    match err {
        ErrorKind::ThickWallOutOfScope { ratio, .. } => assert_eq!(ratio, dec!(0.5)),
        other => panic!("expected ThickWallOutOfScope, got {other:?}"),
    }
    assert!(audit.read_from(1, 10).expect("read").is_empty());
}

#[test]
fn out_of_range_material_fails_without_a_result_or_audit() {
    let (assessor, audit) = assessor();
    let mut job = healthy_job();
    job.equipment.design_temperature = dec!(900);

    let err = assessor.assess(&job).expect_err("temperature beyond coverage");
    assert_eq!(err.code(), "OUT_OF_MATERIAL_RANGE");
    assert!(audit.read_from(1, 10).expect("read").is_empty());
}

#[test]
fn diverging_paths_surface_both_values_and_no_number() {
    // A defective secondary path (wrong bisection bracket) must be refused
    // by reconciliation, not averaged away.
    let primary = dec!(0.2129);
    let poisoned_secondary = dec!(0.3500);
    let err = calc::reconcile("t_min", primary, poisoned_secondary, dec!(0.001))
        .expect_err("divergence must be fatal");
    match err {
        ErrorKind::DualPathDivergence {
            primary: p,
            secondary: s,
            ..
        } => {
            assert_eq!(p, primary);
            assert_eq!(s, poisoned_secondary);
        },
        other => panic!("expected DualPathDivergence, got {other:?}"),
    }
}

#[test]
fn identical_jobs_hash_identically_but_append_twice() {
    let (assessor, audit) = assessor();
    let job = healthy_job();

    let first = assessor.assess(&job).expect("first run");
    let second = assessor.assess(&job).expect("second run");
    assert_ne!(first.calculation_id, second.calculation_id);

    let entry_a = assessor
        .audit_entry(first.calculation_id)
        .expect("lookup")
        .expect("entry exists");
    let entry_b = assessor
        .audit_entry(second.calculation_id)
        .expect("lookup")
        .expect("entry exists");

    assert_eq!(entry_a.input_hash, entry_b.input_hash);
    assert_eq!(entry_a.output_hash, entry_b.output_hash);
    assert_ne!(entry_a.chain_hash, entry_b.chain_hash);
    assert_eq!(entry_b.prev_chain_hash, entry_a.chain_hash);
    assert_eq!(audit.read_from(1, 10).expect("read").len(), 2);
}

#[test]
fn tampered_audit_storage_is_detected_from_the_tampered_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("audit.db");

    let audit = Arc::new(SqliteAuditStore::open(&db_path).expect("open store"));
    let assessor = Assessor::new(
        Arc::new(AsmeSectionIIDTable),
        Arc::clone(&audit) as Arc<dyn AuditStore>,
        Policy::default(),
    );

    for _ in 0..3 {
        assessor.assess(&healthy_job()).expect("assessment succeeds");
    }

    // Out-of-band tamper: a second connection drops the guard trigger and
    // rewrites entry 2's outputs.
    {
        let raw = rusqlite::Connection::open(&db_path).expect("raw connection");
        raw.execute_batch("DROP TRIGGER audit_entries_no_update")
            .expect("drop trigger");
        raw.execute(
            "UPDATE audit_entries SET outputs_canonical = '{\"rsf\":\"1.0000\"}' \
             WHERE seq_id = 2",
            [],
        )
        .expect("tamper");
    }

    match assessor.verify_audit(1).expect("verification runs") {
        ChainVerification::FirstBadAt { seq_id, .. } => assert_eq!(seq_id, 2),
        other => panic!("expected FirstBadAt(2), got {other:?}"),
    }
    // Entries after the break remain readable; the chain is what broke.
    assert_eq!(audit.read_from(3, 10).expect("read").len(), 1);
}

#[test]
fn results_round_trip_through_json_with_exact_digits() {
    let (assessor, _audit) = assessor();
    let result = assessor.assess(&healthy_job()).expect("assessment succeeds");

    let json = serde_json::to_string(&result).expect("serialize");
    // Safety values travel as strings with their declared precision.
    assert!(json.contains("\"t_min\":\"0.2129\""));
    assert!(json.contains("\"mawp\":\"340.12\""));

    let back: CalculationResult = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, result);
}

#[test]
fn dual_path_agreement_holds_across_a_pressure_sweep() {
    let (assessor, _audit) = assessor();
    for pressure in [dec!(25), dec!(75), dec!(150), dec!(300)] {
        let mut job = healthy_job();
        job.equipment.design_pressure = pressure;
        let result = assessor
            .assess(&job)
            .unwrap_or_else(|e| panic!("pressure {pressure}: {e:?}"));
        assert!(result.outputs.t_min > Decimal::ZERO);
    }
}
