//! Error types for the td-app service layer.

use std::path::PathBuf;

/// Application error type wrapping the backend crates' errors behind one
/// interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Failed to read scenario file: {path}")]
    ScenarioFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write scenario file: {path}")]
    ScenarioFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Scenario validation failed: {0}")]
    Validation(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Calibration failed: {0}")]
    Calibration(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for td-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<td_tank::TankError> for AppError {
    fn from(err: td_tank::TankError) -> Self {
        AppError::Geometry(err.to_string())
    }
}

impl From<td_sim::SimError> for AppError {
    fn from(err: td_sim::SimError) -> Self {
        match err {
            td_sim::SimError::CalibrationNonConvergence { .. } => {
                AppError::Calibration(err.to_string())
            }
            td_sim::SimError::Tank(tank) => tank.into(),
            other => AppError::Simulation(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_convergence_maps_to_calibration() {
        let err: AppError = td_sim::SimError::CalibrationNonConvergence {
            iterations: 3,
            last_area_m2: 0.01,
            last_final_height_m: 1.2,
            reason: "iteration cap reached",
        }
        .into();
        assert!(matches!(err, AppError::Calibration(_)));
    }

    #[test]
    fn tank_errors_keep_their_category() {
        let err: AppError = td_sim::SimError::Tank(td_tank::TankError::InvalidGeometry {
            what: "sphere radius must be positive",
        })
        .into();
        assert!(matches!(err, AppError::Geometry(_)));
        assert!(err.to_string().contains("sphere radius"));
    }
}
