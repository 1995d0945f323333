//! Drain simulation for gravity-emptied tanks.
//!
//! Provides:
//! - A pluggable `TransientModel` trait and the Torricelli drain model
//! - An adaptive Dormand-Prince 5(4) integrator with dense output
//! - Outlet sizing calibration (closed form, multiplicative search, fixed)
//! - An immutable height trajectory with time-based sampling

pub mod calibrate;
pub mod drain;
pub mod error;
pub mod integrator;
pub mod model;
pub mod sim;
pub mod trajectory;

// Internal modules
mod events;

// Re-exports for public API
pub use calibrate::{
    CalibrationOptions, CalibrationReport, CalibrationStep, DrainThresholds, SearchTransition,
    SizingStrategy, StepOutcome, calibrate_outlet, calibrate_outlet_with_progress,
    search_transition,
};
pub use drain::{DrainModel, SimulationRun};
pub use error::{SimError, SimResult};
pub use integrator::{DormandPrince45, StepAttempt};
pub use model::TransientModel;
pub use sim::{
    AdaptiveOptions, MAX_OUTPUT_SAMPLES, MAX_TOLERANCE, OutputGrid, SimRecord, SimStats,
    run_adaptive,
};
pub use trajectory::{SnapPolicy, Trajectory};
