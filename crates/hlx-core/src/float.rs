//! Lossless fixed-point wire encoding for floating point quantities.
//!
//! The remote settlement system treats these strings and integers as the
//! literal signed content, so any silent rounding would change the
//! economically signed intent. Values that cannot be represented exactly
//! are rejected with `CoreError::Precision` before anything touches the
//! network.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Maximum absolute error tolerated when parsing an 8-decimal rendering
/// back into a float.
const WIRE_EPSILON: f64 = 1e-12;

/// Maximum distance from an integer tolerated after fixed-point scaling.
const INT_EPSILON: f64 = 1e-3;

/// Format `x` as the canonical wire decimal string.
///
/// The value is rendered to exactly 8 decimal places and rejected if the
/// parsed-back value differs from `x` by `1e-12` or more. The result is
/// the minimal-digit decimal form: no trailing zeros, no scientific
/// notation, and `-0` normalized to `"0"`.
pub fn float_to_wire(x: f64) -> Result<String> {
    let rounded = format!("{x:.8}");
    let parsed: f64 = rounded
        .parse()
        .map_err(|_| CoreError::Precision { value: x, context: "float_to_wire" })?;
    if (parsed - x).abs() >= WIRE_EPSILON {
        return Err(CoreError::Precision { value: x, context: "float_to_wire" });
    }

    // Decimal holds every 8-dp value losslessly; normalize() strips the
    // trailing zeros without re-rounding.
    let decimal = Decimal::from_str(&rounded)
        .map_err(|_| CoreError::Precision { value: x, context: "float_to_wire" })?;
    if decimal.is_zero() {
        return Ok("0".to_string());
    }
    Ok(decimal.normalize().to_string())
}

/// Scale `x` by `10^power` and return the rounded integer.
///
/// Fails if the scaled value is not within `1e-3` of an integer.
pub fn float_to_int(x: f64, power: u32) -> Result<i64> {
    let scaled = x * 10f64.powi(power as i32);
    let rounded = scaled.round();
    if (rounded - scaled).abs() >= INT_EPSILON {
        return Err(CoreError::Precision { value: x, context: "float_to_int" });
    }
    // An out-of-range float would otherwise saturate the cast.
    if rounded >= i64::MAX as f64 || rounded < i64::MIN as f64 {
        return Err(CoreError::Precision { value: x, context: "float_to_int" });
    }
    Ok(rounded as i64)
}

/// Fixed-point USD quantity: 6 decimal places.
///
/// Distinct from [`float_to_int_for_hashing`]; the two resolutions are
/// used by different action kinds and must never be swapped.
pub fn float_to_usd_int(x: f64) -> Result<i64> {
    float_to_int(x, 6)
}

/// Fixed-point quantity for action hashing: 8 decimal places.
pub fn float_to_int_for_hashing(x: f64) -> Result<i64> {
    float_to_int(x, 8)
}
