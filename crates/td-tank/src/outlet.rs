//! Bottom outlet and the Torricelli drain law.
//!
//! Volume balance over the free surface gives
//! `A(h) * dh/dt = -a * sqrt(2 g h)`, with `a` the effective outlet area
//! (orifice area times discharge coefficient).

use crate::common::{check_finite, guard_area};
use crate::error::{TankError, TankResult};
use crate::geometry::TankGeometry;
use td_core::units::{Area, constants::G_MPS2};
use uom::si::area::square_meter;

/// Effective outlet area. Gravity is fixed at [`G_MPS2`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainParameters {
    outlet_area_m2: f64,
}

impl DrainParameters {
    /// Create drain parameters from an effective outlet area.
    pub fn new(outlet_area: Area) -> TankResult<Self> {
        Self::from_m2(outlet_area.get::<square_meter>())
    }

    pub fn from_m2(outlet_area_m2: f64) -> TankResult<Self> {
        if !(outlet_area_m2.is_finite() && outlet_area_m2 > 0.0) {
            return Err(TankError::InvalidArg {
                what: "outlet area must be positive",
            });
        }
        Ok(Self { outlet_area_m2 })
    }

    pub fn outlet_area_m2(&self) -> f64 {
        self.outlet_area_m2
    }
}

/// Rate of change of liquid height, `dh/dt` (m/s).
///
/// Exactly zero for `h <= 0`: an empty tank stays empty. The rate divides
/// by [`TankGeometry::drain_area`], whose floor keeps the area at or above
/// `PI * 1e-3`, so [`TankError::SingularityGuardViolation`] only fires for a
/// NaN area or a geometry defect.
pub fn height_rate(geometry: &TankGeometry, h: f64, outlet_area_m2: f64) -> TankResult<f64> {
    check_finite(h, "liquid height")?;
    check_finite(outlet_area_m2, "outlet area")?;
    if h <= 0.0 {
        return Ok(0.0);
    }

    let area = guard_area(geometry.label(), h, geometry.drain_area(h))?;
    let rate = -(outlet_area_m2 / area) * (2.0 * G_MPS2 * h).sqrt();
    check_finite(rate, "height rate")?;
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use td_core::units::m2;

    fn shapes() -> [TankGeometry; 3] {
        [
            TankGeometry::cylinder_m(1.5).unwrap(),
            TankGeometry::cone_m(2.0, 5.0).unwrap(),
            TankGeometry::sphere_m(2.5).unwrap(),
        ]
    }

    #[test]
    fn empty_tank_is_absorbing() {
        for shape in shapes() {
            assert_eq!(height_rate(&shape, 0.0, 0.1).unwrap(), 0.0);
            assert_eq!(height_rate(&shape, -1e-9, 0.1).unwrap(), 0.0);
        }
    }

    #[test]
    fn positive_height_drains() {
        for shape in shapes() {
            let rate = height_rate(&shape, 2.0, 0.1).unwrap();
            assert!(rate < 0.0, "{} tank should drain", shape.label());
        }
    }

    #[test]
    fn cylinder_rate_matches_torricelli() {
        let cyl = TankGeometry::cylinder_m(1.0).unwrap();
        let rate = height_rate(&cyl, 4.0, 0.01).unwrap();
        let expected = -(0.01 / PI) * (2.0 * 9.81 * 4.0_f64).sqrt();
        assert!((rate - expected).abs() < 1e-12);
    }

    #[test]
    fn rate_scales_with_outlet_area() {
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        let r1 = height_rate(&cone, 3.0, 0.02).unwrap();
        let r2 = height_rate(&cone, 3.0, 0.04).unwrap();
        assert!((r2 - 2.0 * r1).abs() < 1e-12);
    }

    #[test]
    fn full_sphere_rate_is_finite() {
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let rate = height_rate(&sphere, 5.0, 0.15).unwrap();
        assert!(rate.is_finite());
        assert!(rate < 0.0);
    }

    #[test]
    fn nan_height_is_rejected() {
        let cyl = TankGeometry::cylinder_m(1.0).unwrap();
        assert!(matches!(
            height_rate(&cyl, f64::NAN, 0.1),
            Err(TankError::NonPhysical { .. })
        ));
    }

    #[test]
    fn drain_parameters_validation() {
        assert!(DrainParameters::new(m2(0.15)).is_ok());
        assert!(DrainParameters::from_m2(0.0).is_err());
        assert!(DrainParameters::from_m2(-0.1).is_err());
        let p = DrainParameters::from_m2(0.02).unwrap();
        assert_eq!(p.outlet_area_m2(), 0.02);
    }

    #[test]
    fn outflow_balances_height_rate() {
        // A(h) * dh/dt + Q = 0 away from the floored region
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        let h = 3.0;
        let a = 0.05;
        let lhs = cone.cross_section_area(h) * height_rate(&cone, h, a).unwrap();
        assert!((lhs + a * (2.0 * G_MPS2 * h).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn floored_area_bounds_rate_near_singular_points() {
        let a = 0.05;
        let tiny = 1e-12;
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        for (shape, h) in [(cone, tiny), (sphere, tiny), (sphere, 5.0 - tiny)] {
            assert!(shape.drain_area(h) >= PI * 1e-3 * (1.0 - 1e-12));
            let rate = height_rate(&shape, h, a).unwrap();
            let bound = a / (PI * 1e-3) * (2.0 * G_MPS2 * h).sqrt();
            assert!(rate.is_finite());
            assert!(-rate <= bound * (1.0 + 1e-9));
        }
    }
}
