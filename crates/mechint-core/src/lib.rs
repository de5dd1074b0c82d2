//! # mechint-core
//!
//! Fitness-for-service assessment engine for in-service pressure equipment
//! per API 579-1/ASME FFS-1 (Level 1), with a tamper-evident audit chain.
//!
//! Given design parameters, material, and periodic wall-thickness
//! inspection data, the engine computes the minimum required thickness,
//! MAWP, and remaining strength factor through a dual-path calculator,
//! derives corrosion rate and remaining life, recommends a risk-based
//! inspection interval, and appends one immutable hash-chained audit entry
//! per calculation.
//!
//! ## Design rules
//!
//! - **Decimal end to end**: every safety value is a fixed-precision
//!   decimal; binary floating point is rejected at the audit boundary.
//! - **Two paths or no number**: each safety formula is evaluated by two
//!   independent methods and reconciled; divergence is an error carrying
//!   both values, never a choice between them.
//! - **Capabilities, not sessions**: material lookup and audit append are
//!   injected traits; policy is an immutable value.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mechint_core::assess::Assessor;
//! use mechint_core::audit::SqliteAuditStore;
//! use mechint_core::material::AsmeSectionIIDTable;
//! use mechint_core::policy::Policy;
//!
//! # fn example(job: mechint_core::model::Job) -> Result<(), mechint_core::error::ErrorKind> {
//! let assessor = Assessor::new(
//!     Arc::new(AsmeSectionIIDTable),
//!     Arc::new(SqliteAuditStore::open("audit.db").expect("open audit store")),
//!     Policy::default(),
//! );
//! let result = assessor.assess(&job)?;
//! println!("RSF {}, next inspection in {} years",
//!     result.outputs.rsf, result.outputs.next_inspection_years);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod assess;
pub mod audit;
pub mod calc;
pub mod decimal;
pub mod error;
pub mod material;
pub mod model;
pub mod policy;
pub mod rbi;
pub mod trend;
pub mod validate;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assess::{Assessor, CancelToken, pool::AssessmentPool};
    pub use crate::audit::{AuditEntry, AuditStore, ChainVerification, SqliteAuditStore};
    pub use crate::error::ErrorKind;
    pub use crate::material::{AsmeSectionIIDTable, MaterialSource};
    pub use crate::model::{
        AssessmentOptions, CalculationResult, Equipment, EquipmentKind, Fitness, InspectionRecord,
        Job, MaterialRef, RemainingLife, RiskLevel, ThicknessReading,
    };
    pub use crate::policy::Policy;
}

pub use assess::Assessor;
pub use error::ErrorKind;
pub use model::{CalculationResult, Job};
pub use policy::Policy;
