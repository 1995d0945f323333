//! Torricelli drain model and single simulation runs.

use crate::error::{SimError, SimResult};
use crate::events::{clamp_height, validate_positive};
use crate::model::TransientModel;
use crate::sim::{AdaptiveOptions, SimRecord, run_adaptive};
use crate::trajectory::Trajectory;
use td_tank::{DrainParameters, TankGeometry, height_rate};

/// Liquid height in a draining tank as a one-state transient model.
#[derive(Clone, Debug)]
pub struct DrainModel {
    geometry: TankGeometry,
    params: DrainParameters,
    initial_height_m: f64,
    rhs_calls: usize,
}

impl DrainModel {
    /// Create a drain model. The initial height must fit inside the tank.
    pub fn new(
        geometry: TankGeometry,
        params: DrainParameters,
        initial_height_m: f64,
    ) -> SimResult<Self> {
        let initial_height_m = geometry.validate_fill_height(initial_height_m)?;
        Ok(Self {
            geometry,
            params,
            initial_height_m,
            rhs_calls: 0,
        })
    }

    pub fn geometry(&self) -> &TankGeometry {
        &self.geometry
    }

    pub fn params(&self) -> &DrainParameters {
        &self.params
    }

    /// Number of `dh/dt` evaluations so far.
    pub fn rhs_calls(&self) -> usize {
        self.rhs_calls
    }
}

impl TransientModel for DrainModel {
    type State = f64;

    fn initial_state(&self) -> f64 {
        self.initial_height_m
    }

    fn rhs(&mut self, _t: f64, h: &f64) -> SimResult<f64> {
        self.rhs_calls += 1;
        Ok(height_rate(
            &self.geometry,
            *h,
            self.params.outlet_area_m2(),
        )?)
    }

    fn add(&self, a: &f64, b: &f64) -> f64 {
        a + b
    }

    fn scale(&self, a: &f64, scale: f64) -> f64 {
        a * scale
    }

    fn max_abs(&self, a: &f64) -> f64 {
        a.abs()
    }

    fn project(&self, h: f64) -> f64 {
        clamp_height(h)
    }
}

/// One drain simulation: a tank, an outlet, a starting level and a time span.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationRun {
    pub geometry: TankGeometry,
    pub params: DrainParameters,
    pub initial_height_m: f64,
    pub span_s: f64,
}

impl SimulationRun {
    pub fn new(
        geometry: TankGeometry,
        params: DrainParameters,
        initial_height_m: f64,
        span_s: f64,
    ) -> SimResult<Self> {
        let initial_height_m = geometry.validate_fill_height(initial_height_m)?;
        let span_s = validate_positive(span_s, "time span must be positive")?;
        Ok(Self {
            geometry,
            params,
            initial_height_m,
            span_s,
        })
    }

    fn model(&self) -> SimResult<DrainModel> {
        DrainModel::new(self.geometry, self.params, self.initial_height_m)
    }

    /// Integrate over `[0, span]` with adaptive stepping. `opts.t_end` is
    /// replaced by the run's span.
    pub fn integrate(&self, opts: &AdaptiveOptions) -> SimResult<SimRecord<f64>> {
        let opts = AdaptiveOptions {
            t_end: self.span_s,
            ..opts.clone()
        };
        run_adaptive(&mut self.model()?, &opts)
    }

    /// Height left in the tank at the end of the span.
    pub fn final_height(&self, opts: &AdaptiveOptions) -> SimResult<f64> {
        let record = self.integrate(opts)?;
        record
            .last()
            .map(|(_, h)| clamp_height(*h))
            .ok_or(SimError::NonPhysical {
                what: "empty simulation record",
            })
    }

    /// Adaptive run packaged as a sampler-ready trajectory.
    pub fn trajectory(&self, opts: &AdaptiveOptions) -> SimResult<Trajectory> {
        Trajectory::from_record(self.integrate(opts)?)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn larger_outlet_never_leaves_more_liquid(
            area in 0.01_f64..0.2,
            widen in 1.1_f64..3.0,
        ) {
            let geometry = TankGeometry::cone_m(2.0, 5.0).unwrap();
            let final_height = |a: f64| {
                SimulationRun::new(geometry, DrainParameters::from_m2(a).unwrap(), 5.0, 40.0)
                    .unwrap()
                    .final_height(&AdaptiveOptions::default())
                    .unwrap()
            };
            let narrow = final_height(area);
            let wide = final_height(area * widen);
            prop_assert!(wide <= narrow + 1e-6, "narrow={}, wide={}", narrow, wide);
            prop_assert!(wide >= 0.0);
        }
    }
}
