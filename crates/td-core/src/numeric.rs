use crate::TdError;

/// Floating point type used throughout system
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, TdError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(TdError::NonFinite { what, value: v })
    }
}

/// Require a finite, strictly positive value.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, TdError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(TdError::NonPositive { what, value: v })
    }
}

/// Require `v <= limit`, allowing a relative slack of `rel` on the limit.
pub fn ensure_at_most(v: Real, limit: Real, rel: Real, what: &'static str) -> Result<Real, TdError> {
    if v <= limit * (1.0 + rel) {
        Ok(v.min(limit))
    } else {
        Err(TdError::AboveLimit {
            what,
            value: v,
            limit,
        })
    }
}

/// Clamp to `[0, inf)`. NaN maps to zero.
#[inline]
pub fn clamp_non_negative(v: Real) -> Real {
    if v > 0.0 { v } else { 0.0 }
}

/// Linear interpolation between `(x0, y0)` and `(x1, y1)` at `x`.
///
/// Degenerate intervals return `y1`.
#[inline]
pub fn lerp(x0: Real, y0: Real, x1: Real, y1: Real, x: Real) -> Real {
    let dx = x1 - x0;
    if dx <= 0.0 {
        return y1;
    }
    let w = ((x - x0) / dx).clamp(0.0, 1.0);
    y0 + w * (y1 - y0)
}
