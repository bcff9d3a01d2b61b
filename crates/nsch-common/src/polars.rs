//! Cell-level helpers shared by the ingest and transform crates.
//!
//! Survey codes arrive as text or as floats depending on how a file was
//! written, so the same code must render and parse the same way on both
//! paths: `7`, `7.0` and `" 7 "` all mean household or code 7.

use polars::prelude::AnyValue;

/// Parses a cell as `f64`; blank, unparsable and NaN cells are `None`.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Renders a number the way codes are written in label scripts.
///
/// Integral values print without a fractional part.
///
/// ```
/// use nsch_common::format_numeric;
///
/// assert_eq!(format_numeric(996.0), "996");
/// assert_eq!(format_numeric(2.5), "2.5");
/// assert_eq!(format_numeric(-1.0), "-1");
/// ```
pub fn format_numeric(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// A numeric key cell with a fractional part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalKey(pub f64);

/// Canonical text of a key cell, or `None` when the cell is null or blank.
///
/// Numeric keys, whether stored as numbers or as text, must be integral so
/// that `7`, `7.0` and `"7"` name one household and `7.4` names none.
pub fn key_text(value: AnyValue<'_>) -> Result<Option<String>, FractionalKey> {
    let text = match value {
        AnyValue::Null => return Ok(None),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => integral_text(f64::from(v))?,
        AnyValue::Float64(v) if v.is_nan() => return Ok(None),
        AnyValue::Float64(v) => integral_text(v)?,
        AnyValue::String(s) => normalize_key(s)?,
        AnyValue::StringOwned(s) => normalize_key(&s)?,
        other => other.to_string(),
    };
    Ok((!text.is_empty()).then_some(text))
}

fn integral_text(value: f64) -> Result<String, FractionalKey> {
    if value.fract() == 0.0 {
        Ok(format_numeric(value))
    } else {
        Err(FractionalKey(value))
    }
}

fn normalize_key(text: &str) -> Result<String, FractionalKey> {
    match parse_f64(text) {
        Some(number) => integral_text(number),
        None => Ok(text.trim().to_string()),
    }
}
