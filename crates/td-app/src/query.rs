//! Query helpers for summarising and exporting completed runs.

use std::io::Write;

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::run_service::RunResponse;

/// Summary of a run's time range and outcome.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub sample_count: usize,
    pub span_s: f64,
    pub initial_height_m: f64,
    pub final_height_m: f64,
    pub drain_time_s: Option<f64>,
    pub outlet_area_m2: f64,
    pub accepted: bool,
}

/// One exported sample.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SeriesRow {
    pub time_s: f64,
    pub height_m: f64,
    pub volume_m3: f64,
    pub fill_percent: f64,
}

#[derive(Debug, Serialize)]
struct SeriesExport<'a> {
    scenario_id: &'a str,
    geometry: &'static str,
    outlet_area_m2: f64,
    drain_time_s: Option<f64>,
    rows: &'a [SeriesRow],
}

/// Supported series export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(AppError::InvalidInput(format!(
                "Unknown export format: {}",
                other
            ))),
        }
    }
}

/// Get run summary from a completed run.
pub fn get_run_summary(response: &RunResponse) -> RunSummary {
    let trajectory = &response.trajectory;
    RunSummary {
        sample_count: trajectory.len(),
        span_s: trajectory.span_s(),
        initial_height_m: trajectory.initial_height_m(),
        final_height_m: trajectory.final_height_m(),
        drain_time_s: response.report.drain_time_s,
        outlet_area_m2: response.report.outlet_area_m2,
        accepted: response.report.accepted,
    }
}

/// Extract the recorded samples with derived volume and fill level.
pub fn extract_series(response: &RunResponse) -> Vec<SeriesRow> {
    let geometry = &response.geometry;
    response
        .trajectory
        .samples()
        .map(|(t, h)| SeriesRow {
            time_s: t,
            height_m: h,
            volume_m3: geometry.cap_volume(h),
            fill_percent: geometry.fill_percent(h, response.initial_height_m),
        })
        .collect()
}

/// Write rows as CSV with a header line.
pub fn write_series_csv<W: Write>(rows: &[SeriesRow], out: &mut W) -> AppResult<()> {
    writeln!(out, "time_s,height_m,volume_m3,fill_percent")?;
    for row in rows {
        writeln!(
            out,
            "{:.6},{:.6},{:.6},{:.3}",
            row.time_s, row.height_m, row.volume_m3, row.fill_percent
        )?;
    }
    Ok(())
}

/// Serialize a run's series as pretty JSON.
pub fn series_to_json(response: &RunResponse, rows: &[SeriesRow]) -> AppResult<String> {
    let export = SeriesExport {
        scenario_id: &response.scenario_id,
        geometry: response.geometry.label(),
        outlet_area_m2: response.report.outlet_area_m2,
        drain_time_s: response.report.drain_time_s,
        rows,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Export a run's series in the requested format.
pub fn export_series<W: Write>(
    response: &RunResponse,
    format: ExportFormat,
    out: &mut W,
) -> AppResult<()> {
    let rows = extract_series(response);
    match format {
        ExportFormat::Csv => write_series_csv(&rows, out),
        ExportFormat::Json => {
            let json = series_to_json(response, &rows)?;
            writeln!(out, "{}", json)?;
            Ok(())
        }
    }
}
