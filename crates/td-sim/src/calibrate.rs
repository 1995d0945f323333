//! Outlet sizing: pick an outlet area that empties a tank within a time span.
//!
//! Three strategies, chosen per geometry by [`SizingStrategy::default_for`]:
//!
//! - **ClosedForm** (cylinder): invert the analytic drain time and oversize
//!   by a correction factor, escalating once if the check run falls short.
//! - **Search** (cone): grow the area multiplicatively, coarse while far
//!   from empty and fine when close, until the final height is acceptable.
//! - **Fixed** (sphere): use a given area and only verify it.
//!
//! Every candidate is verified by an adaptive simulation over the full span.

use std::time::Duration;

use crate::drain::SimulationRun;
use crate::error::{SimError, SimResult};
use crate::events::validate_positive;
use crate::sim::{AdaptiveOptions, OutputGrid, SimStats};
use crate::trajectory::Trajectory;
use td_core::timing::Deadline;
use td_core::units::constants::G_MPS2;
use td_tank::{DrainParameters, GeometryKind, TankGeometry};

/// Height limits used to judge a candidate outlet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrainThresholds {
    /// A candidate is accepted when the final height is strictly below this (m)
    pub accept_below_m: f64,
    /// Level regarded as empty when reporting the drain time (m)
    pub drained_below_m: f64,
}

impl Default for DrainThresholds {
    fn default() -> Self {
        Self {
            accept_below_m: 0.05,
            drained_below_m: 0.01,
        }
    }
}

/// How the outlet area is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SizingStrategy {
    /// `a = k * A * sqrt(2 h0 / g) / T` for constant-section tanks.
    ClosedForm {
        correction: f64,
        escalated_correction: f64,
    },
    /// Multiplicative search from an initial guess.
    Search {
        initial_area_m2: f64,
        coarse_factor: f64,
        fine_factor: f64,
        /// Final heights above this take the coarse step (m)
        coarse_above_m: f64,
        max_iterations: usize,
    },
    /// A preset area, verified but never adjusted.
    Fixed { area_m2: f64 },
}

impl SizingStrategy {
    pub const CYLINDER: Self = Self::ClosedForm {
        correction: 1.25,
        escalated_correction: 1.5,
    };

    pub const CONE: Self = Self::Search {
        initial_area_m2: 0.02,
        coarse_factor: 1.2,
        fine_factor: 1.1,
        coarse_above_m: 0.5,
        max_iterations: 1000,
    };

    pub const SPHERE: Self = Self::Fixed { area_m2: 0.15 };

    /// Strategy used for a geometry unless overridden.
    pub fn default_for(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Cylindrical => Self::CYLINDER,
            GeometryKind::Conical => Self::CONE,
            GeometryKind::Spherical => Self::SPHERE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ClosedForm { .. } => "closed-form",
            Self::Search { .. } => "search",
            Self::Fixed { .. } => "fixed",
        }
    }

    fn validate(&self, thresholds: &DrainThresholds) -> SimResult<()> {
        match *self {
            Self::ClosedForm {
                correction,
                escalated_correction,
            } => {
                validate_positive(correction, "closed-form correction must be positive")?;
                if !(escalated_correction > correction) {
                    return Err(SimError::InvalidArg {
                        what: "escalated correction must exceed the first correction",
                    });
                }
            }
            Self::Search {
                initial_area_m2,
                coarse_factor,
                fine_factor,
                coarse_above_m,
                max_iterations,
            } => {
                validate_positive(initial_area_m2, "initial outlet area must be positive")?;
                if !(coarse_factor > 1.0) || !(fine_factor > 1.0) || !coarse_factor.is_finite() {
                    return Err(SimError::InvalidArg {
                        what: "search growth factors must be greater than 1",
                    });
                }
                if !(coarse_above_m >= thresholds.accept_below_m) {
                    return Err(SimError::InvalidArg {
                        what: "coarse threshold must not be below the acceptance threshold",
                    });
                }
                if max_iterations == 0 {
                    return Err(SimError::InvalidArg {
                        what: "max_iterations must be positive",
                    });
                }
            }
            Self::Fixed { area_m2 } => {
                validate_positive(area_m2, "fixed outlet area must be positive")?;
            }
        }
        Ok(())
    }
}

/// Calibration configuration.
#[derive(Clone, Debug)]
pub struct CalibrationOptions {
    pub strategy: SizingStrategy,
    pub thresholds: DrainThresholds,
    /// Solver settings for every verification run; `t_end` is ignored
    pub solver: AdaptiveOptions,
    /// Abort the search after this much wall-clock time
    pub wall_clock_budget: Option<Duration>,
}

impl CalibrationOptions {
    /// Default strategy and thresholds for a geometry.
    pub fn for_geometry(geometry: &TankGeometry) -> Self {
        Self {
            strategy: SizingStrategy::default_for(geometry.kind()),
            thresholds: DrainThresholds::default(),
            solver: AdaptiveOptions {
                output: OutputGrid::Steps,
                ..AdaptiveOptions::default()
            },
            wall_clock_budget: None,
        }
    }
}

/// Next move of the search after one verification run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchTransition {
    Accept,
    Coarse,
    Fine,
}

/// Classify a final height. Accept strictly below `accept_below`, take the
/// coarse step strictly above `coarse_above`, otherwise the fine step.
pub fn search_transition(final_h: f64, accept_below: f64, coarse_above: f64) -> SearchTransition {
    if final_h < accept_below {
        SearchTransition::Accept
    } else if final_h > coarse_above {
        SearchTransition::Coarse
    } else {
        SearchTransition::Fine
    }
}

/// What happened to one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    /// Search grows the area by the coarse factor
    Coarse,
    /// Search grows the area by the fine factor
    Fine,
    /// Closed form retries with the escalated correction
    Escalate,
    /// Candidate kept although it failed the check
    Unverified,
    /// Candidate failed and nothing is left to try
    Failed,
}

/// One verified candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationStep {
    pub iteration: usize,
    pub outlet_area_m2: f64,
    pub final_height_m: f64,
    pub outcome: StepOutcome,
}

/// Outcome of a calibration.
#[derive(Clone, Debug)]
pub struct CalibrationReport {
    pub strategy: SizingStrategy,
    pub outlet_area_m2: f64,
    pub final_height_m: f64,
    /// Verification runs performed
    pub iterations: usize,
    /// Closed form needed its second correction
    pub escalated: bool,
    /// Final height is below the acceptance threshold
    pub accepted: bool,
    /// Time at which the level first dropped below the drained threshold
    pub drain_time_s: Option<f64>,
    /// Solver effort summed over all verification runs
    pub stats: SimStats,
    pub history: Vec<CalibrationStep>,
}

impl CalibrationReport {
    pub fn drain_parameters(&self) -> SimResult<DrainParameters> {
        Ok(DrainParameters::from_m2(self.outlet_area_m2)?)
    }
}

struct Candidate {
    final_height_m: f64,
    drain_time_s: Option<f64>,
    stats: SimStats,
}

struct Calibrator<'p> {
    geometry: TankGeometry,
    initial_height_m: f64,
    span_s: f64,
    opts: CalibrationOptions,
    progress: Option<&'p mut dyn FnMut(&CalibrationStep)>,
    history: Vec<CalibrationStep>,
    stats: SimStats,
}

impl Calibrator<'_> {
    fn evaluate(&mut self, area_m2: f64) -> SimResult<Candidate> {
        let run = SimulationRun::new(
            self.geometry,
            DrainParameters::from_m2(area_m2)?,
            self.initial_height_m,
            self.span_s,
        )?;
        let record = run.integrate(&self.opts.solver)?;
        let stats = record.stats;
        let trajectory = Trajectory::from_record(record)?;
        let candidate = Candidate {
            final_height_m: trajectory.final_height_m(),
            drain_time_s: trajectory.first_time_below(self.opts.thresholds.drained_below_m),
            stats,
        };
        self.stats += stats;
        tracing::debug!(
            geometry = self.geometry.label(),
            outlet_area_m2 = area_m2,
            final_height_m = candidate.final_height_m,
            rhs_calls = stats.rhs_calls,
            "verified outlet candidate"
        );
        Ok(candidate)
    }

    fn record(&mut self, area_m2: f64, candidate: &Candidate, outcome: StepOutcome) {
        let step = CalibrationStep {
            iteration: self.history.len() + 1,
            outlet_area_m2: area_m2,
            final_height_m: candidate.final_height_m,
            outcome,
        };
        if let Some(cb) = self.progress.as_deref_mut() {
            cb(&step);
        }
        self.history.push(step);
    }

    fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.final_height_m < self.opts.thresholds.accept_below_m
    }

    fn finish(
        self,
        area_m2: f64,
        candidate: Candidate,
        escalated: bool,
        accepted: bool,
    ) -> CalibrationReport {
        CalibrationReport {
            strategy: self.opts.strategy,
            outlet_area_m2: area_m2,
            final_height_m: candidate.final_height_m,
            iterations: self.history.len(),
            escalated,
            accepted,
            drain_time_s: candidate.drain_time_s,
            stats: self.stats,
            history: self.history,
        }
    }

    fn non_convergence(&self, reason: &'static str) -> SimError {
        let last = self.history.last();
        SimError::CalibrationNonConvergence {
            iterations: self.history.len(),
            last_area_m2: last.map_or(f64::NAN, |s| s.outlet_area_m2),
            last_final_height_m: last.map_or(f64::NAN, |s| s.final_height_m),
            reason,
        }
    }

    fn closed_form(mut self, correction: f64, escalated: f64) -> SimResult<CalibrationReport> {
        let TankGeometry::Cylindrical(_) = self.geometry else {
            return Err(SimError::InvalidArg {
                what: "closed-form sizing requires a cylindrical tank",
            });
        };
        // Cylinder drain time is (A / a) * sqrt(2 h0 / g)
        let section = self.geometry.cross_section_area(self.initial_height_m);
        let exact = section * (2.0 * self.initial_height_m / G_MPS2).sqrt() / self.span_s;

        let area = correction * exact;
        let candidate = self.evaluate(area)?;
        if self.accepts(&candidate) {
            self.record(area, &candidate, StepOutcome::Accepted);
            return Ok(self.finish(area, candidate, false, true));
        }
        self.record(area, &candidate, StepOutcome::Escalate);
        tracing::warn!(
            outlet_area_m2 = area,
            final_height_m = candidate.final_height_m,
            "closed-form outlet left liquid behind, escalating correction"
        );

        let area = escalated * exact;
        let candidate = self.evaluate(area)?;
        if self.accepts(&candidate) {
            self.record(area, &candidate, StepOutcome::Accepted);
            return Ok(self.finish(area, candidate, true, true));
        }
        self.record(area, &candidate, StepOutcome::Failed);
        Err(self.non_convergence("escalated closed-form outlet still fails to drain"))
    }

    fn search(
        mut self,
        initial_area_m2: f64,
        coarse_factor: f64,
        fine_factor: f64,
        coarse_above_m: f64,
        max_iterations: usize,
    ) -> SimResult<CalibrationReport> {
        let deadline = Deadline::new(self.opts.wall_clock_budget);
        let accept_below = self.opts.thresholds.accept_below_m;
        let mut area = initial_area_m2;

        for _ in 0..max_iterations {
            if deadline.expired() {
                tracing::warn!(
                    iterations = self.history.len(),
                    "outlet search ran out of wall-clock budget"
                );
                return Err(self.non_convergence("wall-clock budget exhausted"));
            }

            let candidate = self.evaluate(area)?;
            match search_transition(candidate.final_height_m, accept_below, coarse_above_m) {
                SearchTransition::Accept => {
                    self.record(area, &candidate, StepOutcome::Accepted);
                    return Ok(self.finish(area, candidate, false, true));
                }
                SearchTransition::Coarse => {
                    self.record(area, &candidate, StepOutcome::Coarse);
                    area *= coarse_factor;
                }
                SearchTransition::Fine => {
                    self.record(area, &candidate, StepOutcome::Fine);
                    area *= fine_factor;
                }
            }
        }

        Err(self.non_convergence("iteration cap reached"))
    }

    fn fixed(mut self, area_m2: f64) -> SimResult<CalibrationReport> {
        let candidate = self.evaluate(area_m2)?;
        let accepted = self.accepts(&candidate);
        if accepted {
            self.record(area_m2, &candidate, StepOutcome::Accepted);
        } else {
            self.record(area_m2, &candidate, StepOutcome::Unverified);
            tracing::warn!(
                geometry = self.geometry.label(),
                outlet_area_m2 = area_m2,
                final_height_m = candidate.final_height_m,
                drain_time_s = candidate.drain_time_s,
                "fixed outlet does not empty the tank within the span"
            );
        }
        Ok(self.finish(area_m2, candidate, false, accepted))
    }
}

/// Size the outlet for `geometry` filled to `initial_height_m` so that it
/// drains within `span_s`.
pub fn calibrate_outlet(
    geometry: &TankGeometry,
    initial_height_m: f64,
    span_s: f64,
    opts: &CalibrationOptions,
) -> SimResult<CalibrationReport> {
    calibrate_outlet_with_progress(geometry, initial_height_m, span_s, opts, None)
}

/// [`calibrate_outlet`] with a callback invoked after every verification run.
///
/// Errors:
/// - [`SimError::InvalidArg`] for bad options or a strategy that does not
///   fit the geometry
/// - [`SimError::CalibrationNonConvergence`] when the search or the
///   escalated closed form cannot reach the acceptance threshold
/// - any error from the verification runs
pub fn calibrate_outlet_with_progress(
    geometry: &TankGeometry,
    initial_height_m: f64,
    span_s: f64,
    opts: &CalibrationOptions,
    progress: Option<&mut dyn FnMut(&CalibrationStep)>,
) -> SimResult<CalibrationReport> {
    let initial_height_m = geometry.validate_fill_height(initial_height_m)?;
    let span_s = validate_positive(span_s, "time span must be positive")?;
    opts.strategy.validate(&opts.thresholds)?;

    tracing::info!(
        geometry = geometry.label(),
        strategy = opts.strategy.label(),
        initial_height_m,
        span_s,
        "calibrating outlet"
    );

    let calibrator = Calibrator {
        geometry: *geometry,
        initial_height_m,
        span_s,
        opts: opts.clone(),
        progress,
        history: Vec::new(),
        stats: SimStats::default(),
    };

    let report = match opts.strategy {
        SizingStrategy::ClosedForm {
            correction,
            escalated_correction,
        } => calibrator.closed_form(correction, escalated_correction),
        SizingStrategy::Search {
            initial_area_m2,
            coarse_factor,
            fine_factor,
            coarse_above_m,
            max_iterations,
        } => calibrator.search(
            initial_area_m2,
            coarse_factor,
            fine_factor,
            coarse_above_m,
            max_iterations,
        ),
        SizingStrategy::Fixed { area_m2 } => calibrator.fixed(area_m2),
    }?;

    tracing::info!(
        outlet_area_m2 = report.outlet_area_m2,
        final_height_m = report.final_height_m,
        iterations = report.iterations,
        accepted = report.accepted,
        "outlet calibrated"
    );
    Ok(report)
}
