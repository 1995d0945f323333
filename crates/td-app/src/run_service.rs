//! Run execution: calibrate the outlet, run the production simulation and
//! package the trajectory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use td_core::timing::Timer;
use td_sim::{
    CalibrationReport, CalibrationStep, SimulationRun, Trajectory, calibrate_outlet_with_progress,
};
use td_tank::TankGeometry;

use crate::error::AppResult;
use crate::progress::{CalibrationProgress, RunProgressEvent, RunStage};
use crate::scenario::ScenarioDef;
use crate::scenario_service;

/// Options for running scenarios.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wall-clock limit for the outlet search
    pub calibration_budget: Option<Duration>,
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub scenario: &'a ScenarioDef,
    pub options: RunOptions,
}

/// Concise timing and execution summary for a run.
#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub validate_time_s: f64,
    pub calibrate_time_s: f64,
    pub integrate_time_s: f64,
    pub total_time_s: f64,
    pub calibration_iterations: usize,
    pub calibration_rhs_calls: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_calls: usize,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub scenario_id: String,
    pub geometry: TankGeometry,
    pub initial_height_m: f64,
    pub report: CalibrationReport,
    /// Shared read-only with renderers and exporters
    pub trajectory: Arc<Trajectory>,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    scenario_id: &str,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent::stage(
            scenario_id,
            stage,
            started.elapsed().as_secs_f64(),
            message,
        ));
    }
}

/// Execute a scenario.
pub fn run_scenario(request: &RunRequest) -> AppResult<RunResponse> {
    run_scenario_with_progress(request, None)
}

/// Execute a scenario and stream progress events.
pub fn run_scenario_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let total = Timer::start("run_scenario");
    let scenario = request.scenario;
    let id = scenario.id.as_str();
    let mut timing = RunTimingSummary::default();

    emit_progress(
        &mut progress_cb,
        id,
        RunStage::Validating,
        started,
        Some("Validating scenario".to_string()),
    );
    let timer = Timer::start("validate");
    scenario_service::validate_scenario(scenario)?;
    let geometry = scenario.geometry.to_geometry()?;
    timing.validate_time_s = timer.stop();

    emit_progress(
        &mut progress_cb,
        id,
        RunStage::Calibrating,
        started,
        Some(format!("Sizing outlet for {} tank", geometry.label())),
    );
    let timer = Timer::start("calibrate");
    let mut calibration_opts = scenario.calibration_options(&geometry);
    calibration_opts.wall_clock_budget = request.options.calibration_budget;
    let report = {
        let mut on_step = |step: &CalibrationStep| {
            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(RunProgressEvent {
                    calibration: Some(CalibrationProgress::from(step)),
                    ..RunProgressEvent::stage(
                        id,
                        RunStage::Calibrating,
                        started.elapsed().as_secs_f64(),
                        None,
                    )
                });
            }
        };
        calibrate_outlet_with_progress(
            &geometry,
            scenario.initial_height_m,
            scenario.span_s,
            &calibration_opts,
            Some(&mut on_step),
        )?
    };
    timing.calibrate_time_s = timer.stop();
    timing.calibration_iterations = report.iterations;
    timing.calibration_rhs_calls = report.stats.rhs_calls;

    emit_progress(
        &mut progress_cb,
        id,
        RunStage::Integrating,
        started,
        Some(format!("Outlet area {:.6} m²", report.outlet_area_m2)),
    );
    let timer = Timer::start("integrate");
    let run = SimulationRun::new(
        geometry,
        report.drain_parameters()?,
        scenario.initial_height_m,
        scenario.span_s,
    )?;
    // Same adaptive stepping as the calibration runs, sampled on a uniform grid
    let record = run.integrate(&scenario.solver.production_options())?;
    timing.accepted_steps = record.stats.accepted_steps;
    timing.rejected_steps = record.stats.rejected_steps;
    timing.rhs_calls = record.stats.rhs_calls;
    let trajectory =
        Trajectory::from_record(record)?.with_snap_policy(scenario.thresholds.snap_policy());
    timing.integrate_time_s = timer.stop();
    timing.total_time_s = total.stop_and_print();

    tracing::info!(
        scenario = id,
        outlet_area_m2 = report.outlet_area_m2,
        final_height_m = trajectory.final_height_m(),
        drain_time_s = report.drain_time_s,
        samples = trajectory.len(),
        "scenario run complete"
    );

    emit_progress(
        &mut progress_cb,
        id,
        RunStage::Completed,
        started,
        Some("Run complete".to_string()),
    );

    Ok(RunResponse {
        scenario_id: scenario.id.clone(),
        geometry,
        initial_height_m: scenario.initial_height_m,
        report,
        trajectory: Arc::new(trajectory),
        timing,
    })
}

/// Run independent scenarios in parallel. Results keep the input order.
pub fn run_batch(
    scenarios: &[ScenarioDef],
    options: &RunOptions,
) -> Vec<(String, AppResult<RunResponse>)> {
    scenarios
        .par_iter()
        .map(|scenario| {
            let request = RunRequest {
                scenario,
                options: options.clone(),
            };
            (scenario.id.clone(), run_scenario(&request))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::scenario::reference_presets;

    fn preset(id: &str) -> ScenarioDef {
        let file = reference_presets();
        scenario_service::get_scenario(&file, id).unwrap().clone()
    }

    #[test]
    fn cylinder_run_emits_stages_in_order() {
        let scenario = preset("cylinder");
        let request = RunRequest {
            scenario: &scenario,
            options: RunOptions::default(),
        };
        let mut stages = Vec::new();
        let response = run_scenario_with_progress(
            &request,
            Some(&mut |event: RunProgressEvent| {
                if stages.last() != Some(&event.stage) {
                    stages.push(event.stage);
                }
            }),
        )
        .unwrap();

        assert_eq!(
            stages,
            vec![
                RunStage::Validating,
                RunStage::Calibrating,
                RunStage::Integrating,
                RunStage::Completed
            ]
        );
        assert!(response.report.accepted);
        assert_eq!(response.trajectory.height_at(30.0), 0.0);
        assert_eq!(response.timing.calibration_iterations, 1);
        assert!(response.timing.rhs_calls > 0);
    }

    #[test]
    fn production_run_agrees_with_calibration() {
        for scenario in reference_presets().scenarios {
            let response = run_scenario(&RunRequest {
                scenario: &scenario,
                options: RunOptions::default(),
            })
            .unwrap();
            let report = &response.report;
            let trajectory = &response.trajectory;

            assert!(
                (trajectory.final_height_m() - report.final_height_m).abs() < 1e-6,
                "{}: trajectory ends at {} m, calibration at {} m",
                scenario.id,
                trajectory.final_height_m(),
                report.final_height_m
            );
            let drained_below = scenario.thresholds.drained_below_m;
            assert_eq!(
                trajectory.first_time_below(drained_below).is_some(),
                report.drain_time_s.is_some(),
                "{}: drain time disagrees",
                scenario.id
            );
        }
    }

    #[test]
    fn invalid_scenario_fails_before_calibrating() {
        let mut scenario = preset("cone");
        scenario.span_s = -1.0;
        let mut calibrating = false;
        let err = run_scenario_with_progress(
            &RunRequest {
                scenario: &scenario,
                options: RunOptions::default(),
            },
            Some(&mut |event: RunProgressEvent| {
                calibrating |= event.stage == RunStage::Calibrating;
            }),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!calibrating);
    }
}
