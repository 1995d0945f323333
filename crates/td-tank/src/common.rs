//! Common utilities for geometry and drain calculations.

use crate::error::{TankError, TankResult};
use td_core::numeric::ensure_finite;

/// Floor applied to any squared surface radius (m²) before it is used as
/// a divisor or under a root.
pub const RADIUS_SQ_FLOOR: f64 = 1e-3;

/// Relative slack allowed when checking an initial height against the
/// brim of a bounded tank.
pub const BRIM_TOLERANCE: f64 = 1e-9;

/// Ensure a value is finite, returning TankError if not.
pub fn check_finite(value: f64, what: &'static str) -> TankResult<()> {
    ensure_finite(value, what).map_err(|_| TankError::NonPhysical { what })?;
    Ok(())
}

/// Ensure a shape parameter is finite and strictly positive.
pub fn check_dimension(value: f64, what: &'static str) -> TankResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(TankError::InvalidGeometry { what })
    }
}

/// Squared radius with the underflow floor applied.
#[inline]
pub fn floor_radius_sq(r_sq: f64) -> f64 {
    if r_sq > RADIUS_SQ_FLOOR {
        r_sq
    } else {
        RADIUS_SQ_FLOOR
    }
}

/// Reject a surface area that is not strictly positive for a positive height.
///
/// A failure here points at a defect in the geometry model, never at a
/// legitimately empty tank.
pub fn guard_area(geometry: &'static str, height_m: f64, area_m2: f64) -> TankResult<f64> {
    if area_m2.is_finite() && area_m2 > 0.0 {
        Ok(area_m2)
    } else {
        Err(TankError::SingularityGuardViolation {
            geometry,
            height_m,
            area_m2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_radius_sq() {
        assert_eq!(floor_radius_sq(-1e-12), RADIUS_SQ_FLOOR);
        assert_eq!(floor_radius_sq(0.0), RADIUS_SQ_FLOOR);
        assert_eq!(floor_radius_sq(2.0), 2.0);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(1.0, "r").is_ok());
        assert!(check_dimension(0.0, "r").is_err());
        assert!(check_dimension(-1.0, "r").is_err());
        assert!(check_dimension(f64::NAN, "r").is_err());
    }

    #[test]
    fn test_guard_area() {
        assert_eq!(guard_area("conical", 1.0, 0.5).unwrap(), 0.5);
        let err = guard_area("conical", 1.0, 0.0).unwrap_err();
        assert!(matches!(err, TankError::SingularityGuardViolation { .. }));
        assert!(guard_area("conical", 1.0, -0.1).is_err());
        assert!(guard_area("conical", 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_check_finite() {
        assert!(check_finite(1.0, "test").is_ok());
        assert!(check_finite(f64::INFINITY, "test").is_err());
        assert!(check_finite(f64::NAN, "test").is_err());
    }
}
