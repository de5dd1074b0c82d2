//! Embedded ASME Section II-D sample data.
//!
//! Allowable stress, tensile, and yield values follow Table 1A for the
//! material grades the system ships with; elastic moduli follow the Part D
//! modulus tables for the matching material families. Values are tabulated
//! against temperature in degrees Fahrenheit and interpolated linearly by
//! the resolver.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One tabulated temperature point for a material grade.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MaterialRow {
    /// Temperature in degrees Fahrenheit.
    pub temp_f: Decimal,
    /// Allowable stress, psi.
    pub allowable_stress: Decimal,
    /// Minimum tensile strength, psi.
    pub tensile_strength: Decimal,
    /// Minimum yield strength, psi.
    pub yield_strength: Decimal,
    /// Elastic modulus, psi.
    pub elastic_modulus: Decimal,
    /// Design safety factor at this temperature.
    pub safety_factor: Decimal,
}

macro_rules! row {
    ($t:expr, $s:expr, $u:expr, $y:expr, $e:expr, $f:expr) => {
        MaterialRow {
            temp_f: $t,
            allowable_stress: $s,
            tensile_strength: $u,
            yield_strength: $y,
            elastic_modulus: $e,
            safety_factor: $f,
        }
    };
}

/// SA-516 Grade 70 carbon steel plate (pressure vessels).
pub(crate) const SA_516_70: &[MaterialRow] = &[
    row!(dec!(-20), dec!(20000), dec!(70000), dec!(38000), dec!(29900000), dec!(3.5)),
    row!(dec!(100), dec!(20000), dec!(70000), dec!(38000), dec!(29300000), dec!(3.5)),
    row!(dec!(200), dec!(20000), dec!(70000), dec!(38000), dec!(28800000), dec!(3.5)),
    row!(dec!(300), dec!(19800), dec!(70000), dec!(38000), dec!(28300000), dec!(3.5)),
    row!(dec!(400), dec!(19500), dec!(68000), dec!(36000), dec!(27700000), dec!(3.5)),
    row!(dec!(500), dec!(18800), dec!(65000), dec!(34000), dec!(27100000), dec!(3.5)),
    row!(dec!(600), dec!(17500), dec!(60000), dec!(30000), dec!(26400000), dec!(3.4)),
    row!(dec!(650), dec!(16000), dec!(55000), dec!(28000), dec!(26000000), dec!(3.4)),
    row!(dec!(700), dec!(13500), dec!(50000), dec!(25000), dec!(25500000), dec!(3.7)),
    row!(dec!(750), dec!(12000), dec!(47000), dec!(23000), dec!(24900000), dec!(3.8)),
    row!(dec!(800), dec!(10800), dec!(43000), dec!(21000), dec!(24200000), dec!(3.9)),
];

/// SA-516 Grade 60 carbon steel plate.
pub(crate) const SA_516_60: &[MaterialRow] = &[
    row!(dec!(-20), dec!(17500), dec!(60000), dec!(32000), dec!(29900000), dec!(3.4)),
    row!(dec!(100), dec!(17500), dec!(60000), dec!(32000), dec!(29300000), dec!(3.4)),
    row!(dec!(200), dec!(17500), dec!(60000), dec!(32000), dec!(28800000), dec!(3.4)),
    row!(dec!(300), dec!(17200), dec!(60000), dec!(32000), dec!(28300000), dec!(3.5)),
    row!(dec!(400), dec!(16800), dec!(58000), dec!(30000), dec!(27700000), dec!(3.5)),
    row!(dec!(500), dec!(16000), dec!(55000), dec!(28000), dec!(27100000), dec!(3.4)),
    row!(dec!(600), dec!(14500), dec!(50000), dec!(25000), dec!(26400000), dec!(3.4)),
    row!(dec!(650), dec!(13000), dec!(45000), dec!(22000), dec!(26000000), dec!(3.5)),
];

/// SA-106 Grade B seamless carbon steel pipe.
pub(crate) const SA_106_B: &[MaterialRow] = &[
    row!(dec!(-20), dec!(17100), dec!(60000), dec!(35000), dec!(29900000), dec!(3.5)),
    row!(dec!(100), dec!(17100), dec!(60000), dec!(35000), dec!(29300000), dec!(3.5)),
    row!(dec!(200), dec!(17100), dec!(60000), dec!(35000), dec!(28800000), dec!(3.5)),
    row!(dec!(300), dec!(17100), dec!(60000), dec!(33600), dec!(28300000), dec!(3.5)),
    row!(dec!(400), dec!(16200), dec!(58000), dec!(32000), dec!(27700000), dec!(3.6)),
    row!(dec!(500), dec!(15700), dec!(56000), dec!(30400), dec!(27100000), dec!(3.6)),
    row!(dec!(600), dec!(14800), dec!(53000), dec!(28300), dec!(26400000), dec!(3.6)),
    row!(dec!(650), dec!(14000), dec!(50000), dec!(27000), dec!(26000000), dec!(3.6)),
    row!(dec!(700), dec!(13000), dec!(47000), dec!(25500), dec!(25500000), dec!(3.6)),
    row!(dec!(750), dec!(11800), dec!(44000), dec!(24000), dec!(24900000), dec!(3.7)),
    row!(dec!(800), dec!(10800), dec!(40500), dec!(22000), dec!(24200000), dec!(3.8)),
];

/// SA-335 Grade P11 low-alloy seamless pipe (1.25Cr-0.5Mo).
pub(crate) const SA_335_P11: &[MaterialRow] = &[
    row!(dec!(100), dec!(17100), dec!(60000), dec!(30000), dec!(29900000), dec!(3.5)),
    row!(dec!(300), dec!(16600), dec!(60000), dec!(28300), dec!(28800000), dec!(3.6)),
    row!(dec!(500), dec!(16600), dec!(60000), dec!(26400), dec!(27900000), dec!(3.6)),
    row!(dec!(700), dec!(16600), dec!(60000), dec!(25100), dec!(26600000), dec!(3.6)),
    row!(dec!(800), dec!(15700), dec!(58000), dec!(24400), dec!(25700000), dec!(3.7)),
    row!(dec!(900), dec!(13100), dec!(52000), dec!(23600), dec!(24500000), dec!(4.0)),
    row!(dec!(1000), dec!(6300), dec!(38000), dec!(22300), dec!(23000000), dec!(6.0)),
];

/// SA-240 Type 304 austenitic stainless plate.
pub(crate) const SA_240_304: &[MaterialRow] = &[
    row!(dec!(-20), dec!(20000), dec!(75000), dec!(30000), dec!(28300000), dec!(3.5)),
    row!(dec!(100), dec!(20000), dec!(75000), dec!(30000), dec!(28100000), dec!(3.5)),
    row!(dec!(200), dec!(20000), dec!(71000), dec!(25000), dec!(27600000), dec!(3.5)),
    row!(dec!(300), dec!(18900), dec!(66000), dec!(22400), dec!(27000000), dec!(3.5)),
    row!(dec!(400), dec!(18300), dec!(64400), dec!(20700), dec!(26500000), dec!(3.5)),
    row!(dec!(500), dec!(17500), dec!(63400), dec!(19400), dec!(25800000), dec!(3.6)),
    row!(dec!(600), dec!(16600), dec!(63400), dec!(18400), dec!(25300000), dec!(3.8)),
    row!(dec!(700), dec!(16200), dec!(63400), dec!(17600), dec!(24800000), dec!(3.9)),
    row!(dec!(800), dec!(15200), dec!(62800), dec!(16900), dec!(24100000), dec!(4.1)),
    row!(dec!(900), dec!(14600), dec!(61700), dec!(16500), dec!(23500000), dec!(4.2)),
    row!(dec!(1000), dec!(13800), dec!(58800), dec!(16000), dec!(22800000), dec!(4.3)),
];

/// Looks up the tabulated rows for a combined material designation.
pub(crate) fn rows_for(designation: &str) -> Option<&'static [MaterialRow]> {
    match designation {
        "SA-516-70" => Some(SA_516_70),
        "SA-516-60" => Some(SA_516_60),
        "SA-106-B" => Some(SA_106_B),
        "SA-335-P11" => Some(SA_335_P11),
        "SA-240-304" => Some(SA_240_304),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_sorted_by_temperature() {
        for designation in ["SA-516-70", "SA-516-60", "SA-106-B", "SA-335-P11", "SA-240-304"] {
            let rows = rows_for(designation).unwrap();
            assert!(
                rows.windows(2).all(|w| w[0].temp_f < w[1].temp_f),
                "{designation} rows out of order"
            );
        }
    }

    #[test]
    fn yield_never_exceeds_tensile() {
        for designation in ["SA-516-70", "SA-516-60", "SA-106-B", "SA-335-P11", "SA-240-304"] {
            for row in rows_for(designation).unwrap() {
                assert!(
                    row.yield_strength <= row.tensile_strength,
                    "{designation} at {} F",
                    row.temp_f
                );
                assert!(row.allowable_stress > Decimal::ZERO);
            }
        }
    }

    #[test]
    fn unknown_designation_is_absent() {
        assert!(rows_for("SA-999-1").is_none());
    }
}
