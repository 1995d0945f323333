//! Error types for tank geometry and drain calculations.

use td_core::error::TdError;
use thiserror::Error;

/// Errors that can occur during geometry or drain-rate calculations.
#[derive(Error, Debug, Clone)]
pub enum TankError {
    #[error("Invalid geometry: {what}")]
    InvalidGeometry { what: &'static str },

    #[error(
        "Singularity guard violated for {geometry} tank: surface area {area_m2} m² at height {height_m} m"
    )]
    SingularityGuardViolation {
        geometry: &'static str,
        height_m: f64,
        area_m2: f64,
    },

    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    OutOfRange(TdError),
}

pub type TankResult<T> = Result<T, TankError>;

impl From<TdError> for TankError {
    fn from(e: TdError) -> Self {
        match e {
            TdError::NonFinite { what, .. } => TankError::NonPhysical { what },
            TdError::NonPositive { .. } | TdError::AboveLimit { .. } => TankError::OutOfRange(e),
        }
    }
}
