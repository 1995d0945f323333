//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during drain simulation and outlet calibration.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    /// The adaptive solver could not meet its tolerances. Any partial
    /// trajectory is discarded.
    #[error("Integration failed at t={t:.6} s: {what}")]
    IntegrationFailure { what: String, t: f64 },

    #[error(
        "Calibration did not converge after {iterations} iterations \
         (last outlet area {last_area_m2:.6} m², final height {last_final_height_m:.4} m): {reason}"
    )]
    CalibrationNonConvergence {
        iterations: usize,
        last_area_m2: f64,
        last_final_height_m: f64,
        reason: &'static str,
    },

    #[error("Tank model error: {0}")]
    Tank(#[from] td_tank::TankError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<td_core::TdError> for SimError {
    fn from(e: td_core::TdError) -> Self {
        SimError::Tank(e.into())
    }
}
