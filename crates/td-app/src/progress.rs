use td_sim::{CalibrationStep, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Validating,
    Calibrating,
    Integrating,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            RunStage::Validating => "validating",
            RunStage::Calibrating => "calibrating",
            RunStage::Integrating => "integrating",
            RunStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProgress {
    pub iteration: usize,
    pub outlet_area_m2: f64,
    pub final_height_m: f64,
    pub outcome: StepOutcome,
}

impl From<&CalibrationStep> for CalibrationProgress {
    fn from(step: &CalibrationStep) -> Self {
        Self {
            iteration: step.iteration,
            outlet_area_m2: step.outlet_area_m2,
            final_height_m: step.final_height_m,
            outcome: step.outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub scenario_id: String,
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub calibration: Option<CalibrationProgress>,
}

impl RunProgressEvent {
    pub fn stage(
        scenario_id: &str,
        stage: RunStage,
        elapsed_wall_s: f64,
        message: Option<String>,
    ) -> Self {
        Self {
            scenario_id: scenario_id.to_string(),
            stage,
            elapsed_wall_s,
            message,
            calibration: None,
        }
    }
}
