// td-core/src/units.rs

use uom::si::f64::{Area as UomArea, Length as UomLength, Volume as UomVolume};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Volume = UomVolume;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn m2(v: f64) -> Area {
    use uom::si::area::square_meter;
    Area::new::<square_meter>(v)
}

pub mod constants {
    /// Gravitational acceleration used by the drain model. Fixed, not configurable.
    pub const G_MPS2: f64 = 9.81;
}
