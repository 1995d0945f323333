//! td-tank: tank geometry and gravity-drain dynamics.
//!
//! Provides:
//! - Tank shapes (cylinder, vertex-down cone, sphere) mapping liquid height
//!   to free-surface area and held volume
//! - Torricelli outflow through a single bottom outlet and the resulting
//!   height rate `dh/dt`
//!
//! All functions are pure: deterministic in geometry, height and outlet area.
//!
//! # Example
//!
//! ```
//! use td_core::units::{m, m2};
//! use td_tank::{DrainParameters, TankGeometry, height_rate};
//!
//! let tank = TankGeometry::cone(m(2.0), m(5.0)).unwrap();
//! let drain = DrainParameters::new(m2(0.05)).unwrap();
//!
//! let dhdt = height_rate(&tank, 5.0, drain.outlet_area_m2()).unwrap();
//! assert!(dhdt < 0.0);
//! assert_eq!(height_rate(&tank, 0.0, drain.outlet_area_m2()).unwrap(), 0.0);
//! ```

pub mod common;
pub mod error;
pub mod geometry;
pub mod outlet;

// Re-exports
pub use error::{TankError, TankResult};
pub use geometry::{Cone, Cylinder, GeometryKind, Sphere, TankGeometry};
pub use outlet::{DrainParameters, height_rate};
