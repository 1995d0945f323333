//! Scenario file schema and built-in reference presets.

use serde::{Deserialize, Serialize};
use td_core::units::m;
use td_sim::{
    AdaptiveOptions, CalibrationOptions, DrainThresholds, OutputGrid, SizingStrategy, SnapPolicy,
};
use td_tank::{TankGeometry, TankResult};

/// Current schema version written by [`reference_presets`].
pub const SCENARIO_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioFile {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDef {
    pub id: String,
    pub name: String,
    pub geometry: GeometryDef,
    pub initial_height_m: f64,
    pub span_s: f64,
    /// Overrides the geometry's default sizing strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizing: Option<SizingDef>,
    #[serde(default)]
    pub thresholds: ThresholdsDef,
    #[serde(default)]
    pub solver: SolverDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GeometryDef {
    Cylindrical { radius_m: f64 },
    Conical { radius_m: f64, height_m: f64 },
    Spherical { radius_m: f64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SizingDef {
    ClosedForm {
        correction: f64,
        escalated_correction: f64,
    },
    Search {
        initial_area_m2: f64,
        coarse_factor: f64,
        fine_factor: f64,
        coarse_above_m: f64,
        max_iterations: usize,
    },
    Fixed {
        area_m2: f64,
    },
}

/// Acceptance and presentation thresholds. Each is independent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdsDef {
    pub accept_below_m: f64,
    pub drained_below_m: f64,
    pub snap_below_m: f64,
    pub snap_after_fraction: f64,
}

impl Default for ThresholdsDef {
    fn default() -> Self {
        let drain = DrainThresholds::default();
        let snap = SnapPolicy::default();
        Self {
            accept_below_m: drain.accept_below_m,
            drained_below_m: drain.drained_below_m,
            snap_below_m: snap.below_m,
            snap_after_fraction: snap.after_fraction,
        }
    }
}

/// Adaptive solver settings shared by calibration and the production run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SolverDef {
    pub rtol: f64,
    pub atol: f64,
    /// Spacing of the recorded trajectory (s)
    pub output_dt_s: f64,
}

impl Default for SolverDef {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            output_dt_s: 0.1,
        }
    }
}

impl GeometryDef {
    pub fn to_geometry(&self) -> TankResult<TankGeometry> {
        match *self {
            GeometryDef::Cylindrical { radius_m } => TankGeometry::cylinder(m(radius_m)),
            GeometryDef::Conical { radius_m, height_m } => {
                TankGeometry::cone(m(radius_m), m(height_m))
            }
            GeometryDef::Spherical { radius_m } => TankGeometry::sphere(m(radius_m)),
        }
    }
}

impl From<SizingDef> for SizingStrategy {
    fn from(def: SizingDef) -> Self {
        match def {
            SizingDef::ClosedForm {
                correction,
                escalated_correction,
            } => SizingStrategy::ClosedForm {
                correction,
                escalated_correction,
            },
            SizingDef::Search {
                initial_area_m2,
                coarse_factor,
                fine_factor,
                coarse_above_m,
                max_iterations,
            } => SizingStrategy::Search {
                initial_area_m2,
                coarse_factor,
                fine_factor,
                coarse_above_m,
                max_iterations,
            },
            SizingDef::Fixed { area_m2 } => SizingStrategy::Fixed { area_m2 },
        }
    }
}

impl ThresholdsDef {
    pub fn drain_thresholds(&self) -> DrainThresholds {
        DrainThresholds {
            accept_below_m: self.accept_below_m,
            drained_below_m: self.drained_below_m,
        }
    }

    pub fn snap_policy(&self) -> SnapPolicy {
        SnapPolicy {
            below_m: self.snap_below_m,
            after_fraction: self.snap_after_fraction,
        }
    }
}

impl SolverDef {
    /// Adaptive options for calibration runs (every accepted step recorded).
    pub fn calibration_options(&self) -> AdaptiveOptions {
        AdaptiveOptions {
            rtol: self.rtol,
            atol: self.atol,
            output: OutputGrid::Steps,
            ..AdaptiveOptions::default()
        }
    }

    /// Adaptive options for the production run on the output grid.
    pub fn production_options(&self) -> AdaptiveOptions {
        AdaptiveOptions {
            output: OutputGrid::Uniform {
                dt: self.output_dt_s,
            },
            ..self.calibration_options()
        }
    }
}

impl ScenarioDef {
    /// Calibration configuration for this scenario on `geometry`.
    pub fn calibration_options(&self, geometry: &TankGeometry) -> CalibrationOptions {
        let defaults = CalibrationOptions::for_geometry(geometry);
        CalibrationOptions {
            strategy: self.sizing.map(Into::into).unwrap_or(defaults.strategy),
            thresholds: self.thresholds.drain_thresholds(),
            solver: self.solver.calibration_options(),
            wall_clock_budget: defaults.wall_clock_budget,
        }
    }
}

fn preset(id: &str, name: &str, geometry: GeometryDef, h0: f64, span_s: f64) -> ScenarioDef {
    ScenarioDef {
        id: id.to_string(),
        name: name.to_string(),
        geometry,
        initial_height_m: h0,
        span_s,
        sizing: None,
        thresholds: ThresholdsDef::default(),
        solver: SolverDef::default(),
    }
}

/// The three reference tanks, available without a scenario file.
pub fn reference_presets() -> ScenarioFile {
    ScenarioFile {
        version: SCENARIO_FILE_VERSION,
        name: "Reference tanks".to_string(),
        scenarios: vec![
            preset(
                "cylinder",
                "Cylindrical tank",
                GeometryDef::Cylindrical { radius_m: 1.5 },
                5.0,
                30.0,
            ),
            preset(
                "cone",
                "Conical tank, vertex down",
                GeometryDef::Conical {
                    radius_m: 2.0,
                    height_m: 5.0,
                },
                5.0,
                40.0,
            ),
            preset(
                "sphere",
                "Spherical tank",
                GeometryDef::Spherical { radius_m: 2.5 },
                5.0,
                70.0,
            ),
        ],
    }
}
