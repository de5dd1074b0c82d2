//! Canonical JSON encoding for audit hashing.
//!
//! A strict profile keeps the hash input deterministic across platforms and
//! releases:
//!
//! - Object keys are emitted in lexicographic (byte) order.
//! - No whitespace between tokens.
//! - Numbers must be integers within the signed 64-bit range; floats are
//!   rejected outright. Every safety decimal is serialized as a string
//!   before it reaches this module, so a float in the tree is a defect, not
//!   data.
//! - Nesting deeper than [`MAX_DEPTH`] is rejected.
//!
//! Canonicalization is idempotent: parsing the output and re-encoding it
//! yields the same bytes.

use std::fmt::Write as _;

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 64;

/// Errors raised while canonicalizing a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CanonicalError {
    /// A binary floating-point number reached the audit boundary.
    #[error("float not allowed in canonical encoding: {value}")]
    FloatNotAllowed {
        /// String rendering of the offending number.
        value: String,
    },

    /// An integer outside the signed 64-bit range.
    #[error("number out of range for canonical encoding: {value}")]
    NumberOutOfRange {
        /// String rendering of the offending number.
        value: String,
    },

    /// The value nests deeper than [`MAX_DEPTH`].
    #[error("canonical encoding depth exceeds {max_depth}")]
    MaxDepthExceeded {
        /// The limit that was exceeded.
        max_depth: usize,
    },
}

/// Produces the canonical encoding of a JSON value.
///
/// # Errors
///
/// See [`CanonicalError`].
pub fn canonical_json(value: &Value) -> Result<String, CanonicalError> {
    let mut output = String::new();
    emit_value(value, &mut output, 0)?;
    Ok(output)
}

fn emit_value(value: &Value, output: &mut String, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, output)?,
        Value::String(s) => emit_string(s, output),
        Value::Array(items) => {
            output.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_value(item, output, depth + 1)?;
            }
            output.push(']');
        },
        Value::Object(map) => emit_object(map, output, depth)?,
    }
    Ok(())
}

fn emit_number(n: &Number, output: &mut String) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(output, "{i}");
        return Ok(());
    }
    if n.as_u64().is_some() {
        return Err(CanonicalError::NumberOutOfRange {
            value: n.to_string(),
        });
    }
    Err(CanonicalError::FloatNotAllowed {
        value: n.to_string(),
    })
}

/// Minimal escaping: quote, backslash, and control characters only.
fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            },
            c => output.push(c),
        }
    }
    output.push('"');
}

fn emit_object(
    map: &Map<String, Value>,
    output: &mut String,
    depth: usize,
) -> Result<(), CanonicalError> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    output.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(&map[*key], output, depth + 1)?;
    }
    output.push('}');
    Ok(())
}
