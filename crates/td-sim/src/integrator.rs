//! Embedded Dormand-Prince 5(4) pair for adaptive stepping.
//!
//! The driver that accepts or rejects trial steps lives in `sim.rs`.

use crate::error::SimResult;
use crate::model::TransientModel;

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (also the last stage row, FSAL)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// 5th minus 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Result of one trial step of an embedded pair.
#[derive(Clone, Debug)]
pub struct StepAttempt<S> {
    /// 5th-order solution at `t + dt`
    pub x_new: S,
    /// Estimated local error over the mixed abs/rel tolerance; accept if <= 1
    pub error_ratio: f64,
}

/// Embedded Dormand-Prince 5(4) pair.
#[derive(Clone, Copy, Debug)]
pub struct DormandPrince45 {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for DormandPrince45 {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
        }
    }
}

/// `x + dt * sum(c_i * k_i)`, skipping zero weights.
fn combine<M: TransientModel>(
    model: &M,
    x: &M::State,
    dt: f64,
    terms: &[(f64, &M::State)],
) -> M::State {
    let mut acc = x.clone();
    for (c, k) in terms {
        if *c != 0.0 {
            acc = model.add(&acc, &model.scale(k, dt * c));
        }
    }
    acc
}

impl DormandPrince45 {
    /// rhs evaluations per trial step, given `k1` from the caller.
    pub const TRIAL_STAGES: usize = 6;

    /// Try one step of size `dt` from `(t, x)` with `k1 = f(t, x)` already known.
    pub fn attempt<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        k1: &M::State,
        dt: f64,
    ) -> SimResult<StepAttempt<M::State>> {
        let x2 = combine(model, x, dt, &[(A21, k1)]);
        let k2 = model.rhs(t + C2 * dt, &x2)?;

        let x3 = combine(model, x, dt, &[(A31, k1), (A32, &k2)]);
        let k3 = model.rhs(t + C3 * dt, &x3)?;

        let x4 = combine(model, x, dt, &[(A41, k1), (A42, &k2), (A43, &k3)]);
        let k4 = model.rhs(t + C4 * dt, &x4)?;

        let x5 = combine(
            model,
            x,
            dt,
            &[(A51, k1), (A52, &k2), (A53, &k3), (A54, &k4)],
        );
        let k5 = model.rhs(t + C5 * dt, &x5)?;

        let x6 = combine(
            model,
            x,
            dt,
            &[(A61, k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
        );
        let k6 = model.rhs(t + dt, &x6)?;

        let x_new = combine(
            model,
            x,
            dt,
            &[(B1, k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)],
        );
        let k7 = model.rhs(t + dt, &x_new)?;

        let zero = model.scale(x, 0.0);
        let err = combine(
            model,
            &zero,
            dt,
            &[
                (E1, k1),
                (E3, &k3),
                (E4, &k4),
                (E5, &k5),
                (E6, &k6),
                (E7, &k7),
            ],
        );

        let scale = self.atol + self.rtol * model.max_abs(x).max(model.max_abs(&x_new));
        let error_ratio = model.max_abs(&err) / scale;

        Ok(StepAttempt { x_new, error_ratio })
    }
}
