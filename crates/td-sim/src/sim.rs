//! Adaptive simulation runner and result recording.

use crate::error::{SimError, SimResult};
use crate::events::{validate_non_negative, validate_positive};
use crate::integrator::DormandPrince45;
use crate::model::TransientModel;

/// Loosest relative/absolute tolerance the adaptive runner accepts.
///
/// Anything looser fails to resolve the `sqrt(h)` approach to an empty tank.
pub const MAX_TOLERANCE: f64 = 1e-4;

/// Most samples a uniform output grid may hold.
pub const MAX_OUTPUT_SAMPLES: usize = 1_000_000;

const SAFETY: f64 = 0.9;
const MIN_SHRINK: f64 = 0.2;
const MAX_GROWTH: f64 = 5.0;

/// Which time points the adaptive runner records.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputGrid {
    /// Every accepted step.
    Steps,
    /// A uniform grid `0, dt, 2 dt, ...` plus `t_end`, filled by cubic
    /// Hermite dense output between accepted steps.
    Uniform { dt: f64 },
}

/// Options for adaptive (embedded Runge-Kutta) runs.
#[derive(Clone, Debug)]
pub struct AdaptiveOptions {
    /// Final simulation time (seconds)
    pub t_end: f64,
    /// Relative error tolerance
    pub rtol: f64,
    /// Absolute error tolerance
    pub atol: f64,
    /// First trial step; estimated from the initial slope when `None`
    pub initial_dt: Option<f64>,
    /// Smallest step before giving up (seconds)
    pub min_dt: f64,
    /// Largest step; defaults to the full span
    pub max_dt: Option<f64>,
    /// Maximum number of trial steps, accepted plus rejected
    pub max_steps: usize,
    /// Output time points
    pub output: OutputGrid,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            t_end: 1.0,
            rtol: 1e-6,
            atol: 1e-6,
            initial_dt: None,
            min_dt: 1e-12,
            max_dt: None,
            max_steps: 1_000_000,
            output: OutputGrid::Steps,
        }
    }
}

/// Solver bookkeeping for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_calls: usize,
}

impl std::ops::AddAssign for SimStats {
    fn add_assign(&mut self, rhs: Self) {
        self.accepted_steps += rhs.accepted_steps;
        self.rejected_steps += rhs.rejected_steps;
        self.rhs_calls += rhs.rhs_calls;
    }
}

/// Record of simulation results.
#[derive(Clone, Debug)]
pub struct SimRecord<S> {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// State snapshots
    pub x: Vec<S>,
    /// Step and evaluation counts
    pub stats: SimStats,
}

impl<S> SimRecord<S> {
    /// Last recorded time and state.
    pub fn last(&self) -> Option<(f64, &S)> {
        match (self.t.last(), self.x.last()) {
            (Some(t), Some(x)) => Some((*t, x)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Collects output samples for the adaptive runner.
struct Recorder<S> {
    grid: Option<Vec<f64>>,
    next: usize,
    t: Vec<f64>,
    x: Vec<S>,
}

impl<S: Clone> Recorder<S> {
    fn new(output: OutputGrid, t_end: f64, x0: &S) -> Self {
        let grid = match output {
            OutputGrid::Steps => None,
            OutputGrid::Uniform { dt } => Some(uniform_grid(dt, t_end)),
        };
        Self {
            grid,
            next: 0,
            t: vec![0.0],
            x: vec![x0.clone()],
        }
    }

    /// Record everything owed over the accepted interval `[t0, t1]`.
    #[allow(clippy::too_many_arguments)]
    fn push_interval<M: TransientModel<State = S>>(
        &mut self,
        model: &M,
        t0: f64,
        x0: &S,
        f0: &S,
        t1: f64,
        x1: &S,
        f1: &S,
    ) {
        let Some(grid) = &self.grid else {
            self.t.push(t1);
            self.x.push(x1.clone());
            return;
        };

        while let Some(&tq) = grid.get(self.next) {
            if tq > t1 {
                break;
            }
            let xq = if tq >= t1 {
                x1.clone()
            } else {
                model.project(hermite(model, t0, x0, f0, t1, x1, f1, tq))
            };
            self.t.push(tq);
            self.x.push(xq);
            self.next += 1;
        }
    }

    fn finish(self, stats: SimStats) -> SimRecord<S> {
        SimRecord {
            t: self.t,
            x: self.x,
            stats,
        }
    }
}

/// Output times after zero: multiples of `dt` up to `t_end`, then `t_end`
/// itself unless the last multiple already lands on it.
fn uniform_grid(dt: f64, t_end: f64) -> Vec<f64> {
    let n = (t_end / dt + 1e-9).floor() as usize;
    let mut grid: Vec<f64> = (1..=n).map(|k| (k as f64 * dt).min(t_end)).collect();
    match grid.last() {
        Some(&last) if t_end - last <= 1e-9 * t_end.max(1.0) => {
            if let Some(end) = grid.last_mut() {
                *end = t_end;
            }
        }
        _ if t_end > 0.0 => grid.push(t_end),
        _ => {}
    }
    grid
}

/// Cubic Hermite interpolant on `[t0, t1]` from end values and slopes.
#[allow(clippy::too_many_arguments)]
fn hermite<M: TransientModel>(
    model: &M,
    t0: f64,
    x0: &M::State,
    f0: &M::State,
    t1: f64,
    x1: &M::State,
    f1: &M::State,
    tq: f64,
) -> M::State {
    let h = t1 - t0;
    let s = ((tq - t0) / h).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    let a = model.add(&model.scale(x0, h00), &model.scale(f0, h10 * h));
    let b = model.add(&model.scale(x1, h01), &model.scale(f1, h11 * h));
    model.add(&a, &b)
}

/// Slope-based first step: about 1% of the time for the state to change by its own size.
fn initial_step<M: TransientModel>(model: &M, x0: &M::State, f0: &M::State, atol: f64) -> f64 {
    let x_norm = model.max_abs(x0).max(atol);
    let f_norm = model.max_abs(f0);
    if f_norm > 0.0 && f_norm.is_finite() {
        0.01 * x_norm / f_norm
    } else {
        f64::INFINITY
    }
}

fn validate_adaptive(opts: &AdaptiveOptions) -> SimResult<()> {
    validate_non_negative(opts.t_end, "t_end must be non-negative")?;
    validate_positive(opts.rtol, "rtol must be positive")?;
    validate_positive(opts.atol, "atol must be positive")?;
    if opts.rtol > MAX_TOLERANCE || opts.atol > MAX_TOLERANCE {
        return Err(SimError::InvalidArg {
            what: "tolerances too loose to resolve the drain near empty",
        });
    }
    validate_positive(opts.min_dt, "min_dt must be positive")?;
    if let Some(dt) = opts.initial_dt {
        validate_positive(dt, "initial_dt must be positive")?;
    }
    if let Some(dt) = opts.max_dt {
        validate_positive(dt, "max_dt must be positive")?;
    }
    if let OutputGrid::Uniform { dt } = opts.output {
        validate_positive(dt, "output grid spacing must be positive")?;
        if opts.t_end / dt > MAX_OUTPUT_SAMPLES as f64 {
            return Err(SimError::InvalidArg {
                what: "output grid spacing too fine for the span",
            });
        }
    }
    if opts.max_steps == 0 {
        return Err(SimError::InvalidArg {
            what: "max_steps must be positive",
        });
    }
    Ok(())
}

/// Run a transient simulation with Dormand-Prince 5(4) step-size control.
///
/// Steps shrink automatically where the solution turns sharply (the top of
/// a full sphere, the last centimetres before empty) and grow where it is
/// flat. The record always ends at exactly `t_end`. Failure to meet the
/// tolerances above `min_dt`, or exhausting `max_steps`, is an
/// [`SimError::IntegrationFailure`]; nothing partial is returned.
pub fn run_adaptive<M: TransientModel>(
    model: &mut M,
    opts: &AdaptiveOptions,
) -> SimResult<SimRecord<M::State>> {
    validate_adaptive(opts)?;

    let solver = DormandPrince45 {
        rtol: opts.rtol,
        atol: opts.atol,
    };
    let t_end = opts.t_end;
    let mut stats = SimStats::default();

    let mut t = 0.0;
    let mut x = model.project(model.initial_state());
    let mut k1 = model.rhs(t, &x)?;
    stats.rhs_calls += 1;

    let mut recorder = Recorder::new(opts.output, t_end, &x);
    if t_end == 0.0 {
        return Ok(recorder.finish(stats));
    }

    let max_dt = opts.max_dt.unwrap_or(t_end).min(t_end).max(opts.min_dt);
    let first_dt = match opts.initial_dt {
        Some(dt) => dt,
        None => initial_step(model, &x, &k1, opts.atol),
    };
    let mut dt = first_dt.clamp(opts.min_dt, max_dt);

    while t < t_end {
        if stats.accepted_steps + stats.rejected_steps >= opts.max_steps {
            return Err(SimError::IntegrationFailure {
                what: format!("step budget of {} exhausted", opts.max_steps),
                t,
            });
        }

        let last = t + dt >= t_end;
        let dt_try = if last { t_end - t } else { dt };

        let attempt = solver.attempt(model, t, &x, &k1, dt_try)?;
        stats.rhs_calls += DormandPrince45::TRIAL_STAGES;
        let ratio = attempt.error_ratio;

        if ratio.is_finite() && ratio <= 1.0 {
            let t_new = if last { t_end } else { t + dt_try };
            let x_new = model.project(attempt.x_new);
            let k_new = model.rhs(t_new, &x_new)?;
            stats.rhs_calls += 1;

            recorder.push_interval(model, t, &x, &k1, t_new, &x_new, &k_new);

            t = t_new;
            x = x_new;
            k1 = k_new;
            stats.accepted_steps += 1;

            let growth = if ratio == 0.0 {
                MAX_GROWTH
            } else {
                (SAFETY * ratio.powf(-0.2)).clamp(MIN_SHRINK, MAX_GROWTH)
            };
            dt = (dt_try.max(dt) * growth).min(max_dt);
        } else {
            stats.rejected_steps += 1;
            let shrink = if ratio.is_finite() {
                (SAFETY * ratio.powf(-0.2)).clamp(MIN_SHRINK, SAFETY)
            } else {
                MIN_SHRINK
            };
            dt = dt_try * shrink;
            if dt < opts.min_dt {
                return Err(SimError::IntegrationFailure {
                    what: format!(
                        "step size underflow: {:.3e} s below minimum {:.3e} s",
                        dt, opts.min_dt
                    ),
                    t,
                });
            }
        }
    }

    tracing::trace!(
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        rhs_calls = stats.rhs_calls,
        "adaptive run finished"
    );

    Ok(recorder.finish(stats))
}
