//! Integration tests for td-tank across all three shapes.

use td_core::units::{m, m2};
use td_tank::{DrainParameters, GeometryKind, TankError, TankGeometry, height_rate};

#[test]
fn reference_shapes_construct_from_lengths() {
    let cyl = TankGeometry::cylinder(m(1.5)).unwrap();
    let cone = TankGeometry::cone(m(2.0), m(5.0)).unwrap();
    let sphere = TankGeometry::sphere(m(2.5)).unwrap();

    assert_eq!(cyl.kind(), GeometryKind::Cylindrical);
    assert_eq!(cone.kind(), GeometryKind::Conical);
    assert_eq!(sphere.kind(), GeometryKind::Spherical);
    assert_eq!(sphere.max_height_m(), Some(5.0));
}

#[test]
fn invalid_shapes_are_rejected_at_construction() {
    let err = TankGeometry::sphere(m(0.0)).unwrap_err();
    assert!(matches!(err, TankError::InvalidGeometry { .. }));
    assert!(err.to_string().contains("sphere radius"));
}

#[test]
fn rate_magnitude_tracks_surface_area() {
    // For the sphere the surface is widest at the equator, so the level
    // falls slowest there for the same outlet.
    let sphere = TankGeometry::sphere(m(2.5)).unwrap();
    let drain = DrainParameters::new(m2(0.15)).unwrap();
    let a = drain.outlet_area_m2();

    let at_equator = height_rate(&sphere, 2.5, a).unwrap().abs();
    let near_top = height_rate(&sphere, 4.9, a).unwrap().abs();
    let near_bottom = height_rate(&sphere, 0.1, a).unwrap().abs();

    assert!(near_top > at_equator);
    assert!(near_bottom > at_equator);
}

#[test]
fn cone_rate_is_finite_at_vertex_neighbourhood() {
    let cone = TankGeometry::cone(m(2.0), m(5.0)).unwrap();
    for h in [1e-12, 1e-9, 1e-6, 1e-3, 0.05] {
        let rate = height_rate(&cone, h, 0.05).unwrap();
        assert!(rate.is_finite(), "rate at h={h} must be finite");
        assert!(rate < 0.0);
    }
}
