//! Tank shapes: free-surface area and held volume as functions of liquid height.
//!
//! Heights are measured upward from the outlet at the lowest point of the
//! tank. The cone stands vertex-down with its opening at the top; the sphere
//! drains from its bottom pole.

use std::f64::consts::PI;

use crate::common::{BRIM_TOLERANCE, check_dimension, floor_radius_sq};
use crate::error::TankResult;
use td_core::numeric::{ensure_at_most, ensure_positive};
use td_core::units::Length;
use uom::si::length::meter;

/// Upright cylinder of constant radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    radius_m: f64,
}

/// Vertex-down cone: radius grows linearly from 0 at the outlet to `radius_m` at `height_m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    radius_m: f64,
    height_m: f64,
}

/// Sphere draining from its bottom pole. Full at `2 * radius_m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    radius_m: f64,
}

impl Cylinder {
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }
}

impl Cone {
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    /// Radius growth per metre of height, `R / H`.
    fn slope(&self) -> f64 {
        self.radius_m / self.height_m
    }
}

impl Sphere {
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }
}

/// Discriminant-only view of a [`TankGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Cylindrical,
    Conical,
    Spherical,
}

impl GeometryKind {
    pub fn label(&self) -> &'static str {
        match self {
            GeometryKind::Cylindrical => "cylindrical",
            GeometryKind::Conical => "conical",
            GeometryKind::Spherical => "spherical",
        }
    }
}

/// Immutable tank shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TankGeometry {
    Cylindrical(Cylinder),
    Conical(Cone),
    Spherical(Sphere),
}

impl TankGeometry {
    /// Create a cylindrical tank.
    pub fn cylinder(radius: Length) -> TankResult<Self> {
        Self::cylinder_m(radius.get::<meter>())
    }

    /// Create a vertex-down conical tank.
    pub fn cone(radius: Length, height: Length) -> TankResult<Self> {
        Self::cone_m(radius.get::<meter>(), height.get::<meter>())
    }

    /// Create a spherical tank.
    pub fn sphere(radius: Length) -> TankResult<Self> {
        Self::sphere_m(radius.get::<meter>())
    }

    pub fn cylinder_m(radius_m: f64) -> TankResult<Self> {
        let radius_m = check_dimension(radius_m, "cylinder radius must be positive")?;
        Ok(TankGeometry::Cylindrical(Cylinder { radius_m }))
    }

    pub fn cone_m(radius_m: f64, height_m: f64) -> TankResult<Self> {
        let radius_m = check_dimension(radius_m, "cone radius must be positive")?;
        let height_m = check_dimension(height_m, "cone height must be positive")?;
        Ok(TankGeometry::Conical(Cone { radius_m, height_m }))
    }

    pub fn sphere_m(radius_m: f64) -> TankResult<Self> {
        let radius_m = check_dimension(radius_m, "sphere radius must be positive")?;
        Ok(TankGeometry::Spherical(Sphere { radius_m }))
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            TankGeometry::Cylindrical(_) => GeometryKind::Cylindrical,
            TankGeometry::Conical(_) => GeometryKind::Conical,
            TankGeometry::Spherical(_) => GeometryKind::Spherical,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Height of the brim, if the shape is closed at the top.
    ///
    /// Cylinders are unbounded: any initial height is admissible.
    pub fn max_height_m(&self) -> Option<f64> {
        match self {
            TankGeometry::Cylindrical(_) => None,
            TankGeometry::Conical(c) => Some(c.height_m),
            TankGeometry::Spherical(s) => Some(2.0 * s.radius_m),
        }
    }

    /// Check an initial fill height against this shape.
    pub fn validate_fill_height(&self, h0: f64) -> TankResult<f64> {
        let h0 = ensure_positive(h0, "initial height")?;
        match self.max_height_m() {
            Some(h_max) => Ok(ensure_at_most(h0, h_max, BRIM_TOLERANCE, "initial height")?),
            None => Ok(h0),
        }
    }

    /// Unfloored squared radius of the free surface at height `h`.
    ///
    /// May be zero (cone vertex, sphere poles) or slightly negative from
    /// round-off just outside the sphere.
    pub fn surface_radius_sq(&self, h: f64) -> f64 {
        match self {
            TankGeometry::Cylindrical(c) => c.radius_m * c.radius_m,
            TankGeometry::Conical(c) => {
                let r = c.slope() * h;
                r * r
            }
            TankGeometry::Spherical(s) => 2.0 * s.radius_m * h - h * h,
        }
    }

    /// Exact free-surface area at height `h` (m²).
    ///
    /// Zero at the cone vertex and at the sphere's bottom pole; constant for
    /// the cylinder. Heights are clamped to the tank's valid range.
    pub fn cross_section_area(&self, h: f64) -> f64 {
        let h = self.clamp_height(h);
        match self {
            TankGeometry::Cylindrical(c) => PI * c.radius_m * c.radius_m,
            _ => PI * self.surface_radius_sq(h).max(0.0),
        }
    }

    /// Free-surface area as seen by the drain ODE.
    ///
    /// Same as [`cross_section_area`](Self::cross_section_area) except that
    /// the squared radius is floored, keeping `1 / area` bounded at the cone
    /// vertex and at both sphere poles.
    pub fn drain_area(&self, h: f64) -> f64 {
        match self {
            TankGeometry::Cylindrical(c) => PI * c.radius_m * c.radius_m,
            _ => PI * floor_radius_sq(self.surface_radius_sq(h)),
        }
    }

    /// Liquid volume held below height `h` (m³).
    pub fn cap_volume(&self, h: f64) -> f64 {
        let h = self.clamp_height(h);
        match self {
            TankGeometry::Cylindrical(c) => PI * c.radius_m * c.radius_m * h,
            TankGeometry::Conical(c) => {
                let k = c.slope();
                PI * k * k * h * h * h / 3.0
            }
            TankGeometry::Spherical(s) => {
                let r = s.radius_m;
                if h <= r {
                    PI / 3.0 * h * h * (3.0 * r - h)
                } else {
                    // Whole sphere minus the empty cap above the surface
                    let gap = 2.0 * r - h;
                    4.0 / 3.0 * PI * r * r * r - PI / 3.0 * gap * gap * (3.0 * r - gap)
                }
            }
        }
    }

    /// Fill level as a percentage of the volume at `reference_height_m`.
    pub fn fill_percent(&self, h: f64, reference_height_m: f64) -> f64 {
        let full = self.cap_volume(reference_height_m);
        if full <= 0.0 {
            return 0.0;
        }
        (100.0 * self.cap_volume(h) / full).clamp(0.0, 100.0)
    }

    fn clamp_height(&self, h: f64) -> f64 {
        let h = if h > 0.0 { h } else { 0.0 };
        match self.max_height_m() {
            Some(h_max) => h.min(h_max),
            None => h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TankError;
    use td_core::numeric::{Tolerances, nearly_equal};
    use td_core::units::m;

    const TOL: Tolerances = Tolerances {
        abs: 1e-12,
        rel: 1e-10,
    };

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(matches!(
            TankGeometry::cylinder(m(0.0)),
            Err(TankError::InvalidGeometry { .. })
        ));
        assert!(TankGeometry::cone(m(2.0), m(-5.0)).is_err());
        assert!(TankGeometry::cone(m(-2.0), m(5.0)).is_err());
        assert!(TankGeometry::sphere_m(f64::NAN).is_err());
    }

    #[test]
    fn singular_points_have_zero_area() {
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let cyl = TankGeometry::cylinder_m(1.0).unwrap();

        assert_eq!(cone.cross_section_area(0.0), 0.0);
        assert_eq!(sphere.cross_section_area(0.0), 0.0);
        assert!(nearly_equal(cyl.cross_section_area(0.0), PI, TOL));
    }

    #[test]
    fn cone_area_grows_quadratically() {
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        let a1 = cone.cross_section_area(1.0);
        let a2 = cone.cross_section_area(2.0);
        assert!(nearly_equal(a2, 4.0 * a1, TOL));
        assert!(nearly_equal(cone.cross_section_area(5.0), PI * 4.0, TOL));
    }

    #[test]
    fn sphere_area_peaks_at_equator() {
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let equator = sphere.cross_section_area(2.5);
        assert!(nearly_equal(equator, PI * 6.25, TOL));
        assert!(sphere.cross_section_area(1.0) < equator);
        assert!(sphere.cross_section_area(4.0) < equator);
        // Top pole collapses to a point again
        assert!(sphere.cross_section_area(5.0).abs() < 1e-12);
    }

    #[test]
    fn drain_area_is_floored_at_poles() {
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let floor = PI * crate::common::RADIUS_SQ_FLOOR;
        assert!(nearly_equal(sphere.drain_area(5.0), floor, TOL));
        assert!(nearly_equal(sphere.drain_area(0.0), floor, TOL));
        assert!(sphere.drain_area(5.0 + 1e-9).is_finite());
    }

    #[test]
    fn volumes_round_trip_to_full_tank() {
        let cyl = TankGeometry::cylinder_m(1.5).unwrap();
        assert!(nearly_equal(cyl.cap_volume(5.0), PI * 2.25 * 5.0, TOL));

        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        assert!(nearly_equal(cone.cap_volume(5.0), PI * 4.0 * 5.0 / 3.0, TOL));

        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let full = 4.0 / 3.0 * PI * 2.5_f64.powi(3);
        assert!(nearly_equal(sphere.cap_volume(5.0), full, TOL));
        assert!(nearly_equal(sphere.cap_volume(2.5), full / 2.0, TOL));
    }

    #[test]
    fn sphere_volume_branches_agree_at_equator() {
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        let below = sphere.cap_volume(2.5 - 1e-9);
        let above = sphere.cap_volume(2.5 + 1e-9);
        assert!((above - below).abs() < 1e-6);
    }

    #[test]
    fn volume_clamped_outside_valid_heights() {
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        assert_eq!(cone.cap_volume(-1.0), 0.0);
        assert_eq!(cone.cap_volume(6.0), cone.cap_volume(5.0));
    }

    #[test]
    fn fill_height_validation() {
        let sphere = TankGeometry::sphere_m(2.5).unwrap();
        assert_eq!(sphere.validate_fill_height(5.0).unwrap(), 5.0);
        assert!(sphere.validate_fill_height(5.1).is_err());
        assert!(sphere.validate_fill_height(0.0).is_err());

        let cyl = TankGeometry::cylinder_m(1.0).unwrap();
        assert_eq!(cyl.validate_fill_height(50.0).unwrap(), 50.0);
        assert_eq!(cyl.max_height_m(), None);
    }

    #[test]
    fn fill_percent_bounds() {
        let cone = TankGeometry::cone_m(2.0, 5.0).unwrap();
        assert_eq!(cone.fill_percent(5.0, 5.0), 100.0);
        assert_eq!(cone.fill_percent(0.0, 5.0), 0.0);
        // Half height of a cone holds one eighth of the volume
        assert!(nearly_equal(cone.fill_percent(2.5, 5.0), 12.5, TOL));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn areas_are_non_negative(h in -1.0_f64..6.0) {
            let shapes = [
                TankGeometry::cylinder_m(1.5).unwrap(),
                TankGeometry::cone_m(2.0, 5.0).unwrap(),
                TankGeometry::sphere_m(2.5).unwrap(),
            ];
            for shape in shapes {
                prop_assert!(shape.cross_section_area(h) >= 0.0);
                prop_assert!(shape.drain_area(h) > 0.0);
            }
        }

        #[test]
        fn volume_is_monotone_in_height(h in 0.0_f64..5.0, dh in 0.0_f64..1.0) {
            let shapes = [
                TankGeometry::cylinder_m(1.5).unwrap(),
                TankGeometry::cone_m(2.0, 5.0).unwrap(),
                TankGeometry::sphere_m(2.5).unwrap(),
            ];
            for shape in shapes {
                prop_assert!(shape.cap_volume(h + dh) >= shape.cap_volume(h) - 1e-12);
            }
        }
    }
}
