//! td-core: shared foundation for tankdrain.
//!
//! Contains:
//! - units (uom SI types + constructors, gravitational constant)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)
//! - timing (wall-clock timer for run summaries)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{TdError, TdResult};
pub use numeric::*;
pub use units::*;
