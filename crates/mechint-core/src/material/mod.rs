//! Material and geometry property resolution.
//!
//! Resolves `(material, temperature)` to ASME Section II-D allowable stress
//! and companion strengths. Interpolation between tabulated temperature
//! points is linear; extrapolation in either direction fails with
//! [`ErrorKind::OutOfMaterialRange`]. Unknown materials fail with
//! [`ErrorKind::PropertyMissing`] — there is no conservative-default
//! fallback; an assumed property is worse than a refused job.
//!
//! Geometry is resolved strictly from the equipment record. Assumed or
//! defaulted dimensions are forbidden for the same reason.

mod table;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal;
use crate::error::ErrorKind;
use crate::model::{Equipment, MaterialRef};

/// Where a resolved property came from, captured for the audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source document, e.g. `ASME BPVC Section II-D`.
    pub source_document: String,
    /// Table within the document.
    pub table: String,
    /// Edition year.
    pub edition_year: u16,
}

/// Material properties resolved at a specific temperature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProperties {
    /// The material that was resolved.
    pub material: MaterialRef,
    /// Temperature the properties apply at, degrees Fahrenheit.
    pub temperature: Decimal,
    /// Allowable stress, psi.
    pub allowable_stress: Decimal,
    /// Minimum yield strength, psi.
    pub yield_strength: Decimal,
    /// Minimum tensile strength, psi.
    pub tensile_strength: Decimal,
    /// Elastic modulus, psi.
    pub elastic_modulus: Decimal,
    /// Design safety factor.
    pub safety_factor: Decimal,
    /// Source provenance.
    pub provenance: Provenance,
}

/// Geometry derived from the equipment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGeometry {
    /// Internal diameter, inches.
    pub internal_diameter: Decimal,
    /// External diameter, inches.
    pub external_diameter: Decimal,
    /// Internal radius, inches.
    pub internal_radius: Decimal,
    /// Nominal wall from the diameters, inches.
    pub wall_thickness: Decimal,
}

/// A source of material properties. The outer process may wire this to its
/// database; the core ships a static table.
pub trait MaterialSource: Send + Sync {
    /// Resolves properties for `material` at `temperature`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::PropertyMissing`] if the material is unknown.
    /// - [`ErrorKind::OutOfMaterialRange`] if `temperature` lies outside the
    ///   tabulated coverage.
    fn resolve(
        &self,
        material: &MaterialRef,
        temperature: Decimal,
    ) -> Result<ResolvedProperties, ErrorKind>;
}

/// The embedded ASME Section II-D table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsmeSectionIIDTable;

impl AsmeSectionIIDTable {
    fn provenance() -> Provenance {
        Provenance {
            source_document: "ASME BPVC Section II-D".to_string(),
            table: "1A".to_string(),
            edition_year: 2023,
        }
    }
}

impl MaterialSource for AsmeSectionIIDTable {
    fn resolve(
        &self,
        material: &MaterialRef,
        temperature: Decimal,
    ) -> Result<ResolvedProperties, ErrorKind> {
        let designation = material.designation();
        let rows = table::rows_for(&designation).ok_or_else(|| ErrorKind::PropertyMissing {
            detail: format!("material {designation} is not in the property table"),
        })?;

        let low = rows[0].temp_f;
        let high = rows[rows.len() - 1].temp_f;
        if temperature < low || temperature > high {
            return Err(ErrorKind::OutOfMaterialRange {
                material: designation,
                requested: temperature,
                low,
                high,
            });
        }

        // Exact hit or the bracketing pair for linear interpolation.
        if let Some(row) = rows.iter().find(|r| r.temp_f == temperature) {
            return Ok(ResolvedProperties {
                material: material.clone(),
                temperature,
                allowable_stress: row.allowable_stress,
                yield_strength: row.yield_strength,
                tensile_strength: row.tensile_strength,
                elastic_modulus: row.elastic_modulus,
                safety_factor: row.safety_factor,
                provenance: Self::provenance(),
            });
        }

        let upper_idx = rows
            .iter()
            .position(|r| r.temp_f > temperature)
            .ok_or_else(|| ErrorKind::Internal {
                detail: format!("no bracketing row for {temperature} F in {designation}"),
            })?;
        let lower = &rows[upper_idx - 1];
        let upper = &rows[upper_idx];

        let span = decimal::sub(upper.temp_f, lower.temp_f, "interpolation span")?;
        let offset = decimal::sub(temperature, lower.temp_f, "interpolation offset")?;
        let fraction = decimal::div(offset, span, "interpolation fraction")?;

        let lerp = |lo: Decimal, hi: Decimal| -> Result<Decimal, ErrorKind> {
            let delta = decimal::sub(hi, lo, "interpolation delta")?;
            let scaled = decimal::mul(fraction, delta, "interpolation scale")?;
            Ok(decimal::add(lo, scaled, "interpolation sum")?)
        };

        Ok(ResolvedProperties {
            material: material.clone(),
            temperature,
            allowable_stress: lerp(lower.allowable_stress, upper.allowable_stress)?,
            yield_strength: lerp(lower.yield_strength, upper.yield_strength)?,
            tensile_strength: lerp(lower.tensile_strength, upper.tensile_strength)?,
            elastic_modulus: lerp(lower.elastic_modulus, upper.elastic_modulus)?,
            safety_factor: lerp(lower.safety_factor, upper.safety_factor)?,
            provenance: Self::provenance(),
        })
    }
}

/// Resolves geometry from the equipment record.
///
/// # Errors
///
/// Returns [`ErrorKind::PropertyMissing`] when a required dimension is
/// absent. Every Level 1 equipment kind requires both diameters.
pub fn resolve_geometry(equipment: &Equipment) -> Result<ResolvedGeometry, ErrorKind> {
    let internal_diameter =
        equipment
            .internal_diameter
            .ok_or_else(|| ErrorKind::PropertyMissing {
                detail: format!(
                    "internal diameter absent for {} {}",
                    equipment.kind.as_str(),
                    equipment.tag
                ),
            })?;
    let external_diameter =
        equipment
            .external_diameter
            .ok_or_else(|| ErrorKind::PropertyMissing {
                detail: format!(
                    "external diameter absent for {} {}",
                    equipment.kind.as_str(),
                    equipment.tag
                ),
            })?;

    let internal_radius = decimal::div(internal_diameter, dec!(2), "internal radius")?;
    let diameter_delta = decimal::sub(external_diameter, internal_diameter, "wall thickness")?;
    let wall_thickness = decimal::div(diameter_delta, dec!(2), "wall thickness")?;

    Ok(ResolvedGeometry {
        internal_diameter,
        external_diameter,
        internal_radius,
        wall_thickness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sa_516_70() -> MaterialRef {
        MaterialRef::new("SA-516", "70")
    }

    #[test]
    fn exact_tabulated_point_resolves_without_interpolation() {
        let props = AsmeSectionIIDTable
            .resolve(&sa_516_70(), dec!(300))
            .unwrap();
        assert_eq!(props.allowable_stress, dec!(19800));
        assert_eq!(props.yield_strength, dec!(38000));
        assert_eq!(props.provenance.table, "1A");
    }

    #[test]
    fn interpolation_is_linear_between_points() {
        // Midway between 600 F (17500) and 650 F (16000).
        let props = AsmeSectionIIDTable
            .resolve(&sa_516_70(), dec!(625))
            .unwrap();
        assert_eq!(props.allowable_stress, dec!(16750));
    }

    #[test]
    fn extrapolation_above_coverage_fails() {
        let err = AsmeSectionIIDTable
            .resolve(&sa_516_70(), dec!(900))
            .unwrap_err();
        match err {
            ErrorKind::OutOfMaterialRange { high, .. } => assert_eq!(high, dec!(800)),
            other => panic!("expected OutOfMaterialRange, got {other:?}"),
        }
    }

    #[test]
    fn extrapolation_below_coverage_fails() {
        let err = AsmeSectionIIDTable
            .resolve(&sa_516_70(), dec!(-40))
            .unwrap_err();
        assert_eq!(err.code(), "OUT_OF_MATERIAL_RANGE");
    }

    #[test]
    fn unknown_material_is_property_missing_not_a_default() {
        let err = AsmeSectionIIDTable
            .resolve(&MaterialRef::new("SA-999", "1"), dec!(200))
            .unwrap_err();
        assert_eq!(err.code(), "PROPERTY_MISSING");
    }

    #[test]
    fn geometry_resolves_radius_and_wall() {
        let equipment = Equipment {
            tag: "V-101".to_string(),
            kind: crate::model::EquipmentKind::Vessel,
            design_pressure: dec!(150),
            design_temperature: dec!(300),
            nominal_thickness: dec!(0.500),
            corrosion_allowance: dec!(0.125),
            joint_efficiency: dec!(0.85),
            material: sa_516_70(),
            internal_diameter: Some(dec!(48.00)),
            external_diameter: Some(dec!(49.00)),
            length: None,
        };
        let geometry = resolve_geometry(&equipment).unwrap();
        assert_eq!(geometry.internal_radius, dec!(24.00));
        assert_eq!(geometry.wall_thickness, dec!(0.50));
    }

    #[test]
    fn missing_internal_diameter_fails() {
        let equipment = Equipment {
            tag: "P-7".to_string(),
            kind: crate::model::EquipmentKind::Piping,
            design_pressure: dec!(150),
            design_temperature: dec!(300),
            nominal_thickness: dec!(0.300),
            corrosion_allowance: dec!(0.0625),
            joint_efficiency: dec!(1.0),
            material: MaterialRef::new("SA-106", "B"),
            internal_diameter: None,
            external_diameter: Some(dec!(8.625)),
            length: None,
        };
        let err = resolve_geometry(&equipment).unwrap_err();
        assert_eq!(err.code(), "PROPERTY_MISSING");
    }
}
