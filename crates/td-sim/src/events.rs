//! Small guards shared by the integrators and the drain model.

use crate::error::{SimError, SimResult};

/// Clamp a height to `[0, inf)`. Negative residue from discrete stepping
/// is expected and recovered here.
pub(crate) fn clamp_height(h: f64) -> f64 {
    td_core::numeric::clamp_non_negative(h)
}

/// Require a finite, strictly positive option value.
pub(crate) fn validate_positive(val: f64, name: &'static str) -> SimResult<f64> {
    if !val.is_finite() || val <= 0.0 {
        return Err(SimError::InvalidArg { what: name });
    }
    Ok(val)
}

/// Require a finite, non-negative option value.
pub(crate) fn validate_non_negative(val: f64, name: &'static str) -> SimResult<f64> {
    if !val.is_finite() || val < 0.0 {
        return Err(SimError::InvalidArg { what: name });
    }
    Ok(val)
}
