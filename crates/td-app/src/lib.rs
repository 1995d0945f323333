//! Shared application service layer for tankdrain.
//!
//! Scenario configuration, single and batch runs, series export and
//! real-time playback, used by the CLI front end.

pub mod error;
pub mod playback;
pub mod progress;
pub mod query;
pub mod run_service;
pub mod scenario;
pub mod scenario_service;

// Re-export key types for convenience
pub use error::{AppError, AppResult};
pub use playback::{Clock, ManualClock, MonotonicClock, Playback, PlaybackFrame};
pub use progress::{CalibrationProgress, RunProgressEvent, RunStage};
pub use query::{ExportFormat, RunSummary, SeriesRow, export_series, extract_series, get_run_summary};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, RunTimingSummary, run_batch, run_scenario,
    run_scenario_with_progress,
};
pub use scenario::{ScenarioDef, ScenarioFile, reference_presets};
pub use scenario_service::{
    ScenarioSummary, get_scenario, list_scenarios, load_or_presets, load_scenarios,
    save_scenarios, validate_scenarios,
};
