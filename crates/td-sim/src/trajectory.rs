//! Immutable height trajectory and time-based sampling.
//!
//! A [`Trajectory`] is produced once per run and never mutated afterwards,
//! so any number of readers (a renderer on its own tick, an exporter) can
//! sample it concurrently.

use crate::error::{SimError, SimResult};
use crate::events::clamp_height;
use crate::sim::SimRecord;
use td_core::numeric::lerp;

/// Presentation rule: near the end of the span, a level this low reads as empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapPolicy {
    /// Heights strictly below this snap to zero (m)
    pub below_m: f64,
    /// ...but only once elapsed time exceeds this fraction of the span
    pub after_fraction: f64,
}

impl Default for SnapPolicy {
    fn default() -> Self {
        Self {
            below_m: 0.05,
            after_fraction: 0.95,
        }
    }
}

impl SnapPolicy {
    /// Never snap before the end of the span.
    pub fn disabled() -> Self {
        Self {
            below_m: 0.0,
            after_fraction: 1.0,
        }
    }

    fn applies(&self, elapsed: f64, span: f64, height: f64) -> bool {
        elapsed > self.after_fraction * span && height < self.below_m
    }
}

/// Time-ordered `(t, h)` samples over `[0, span]`, heights non-increasing.
#[derive(Clone, Debug)]
pub struct Trajectory {
    t: Vec<f64>,
    h: Vec<f64>,
    snap: SnapPolicy,
}

impl Trajectory {
    /// Build a trajectory from raw samples.
    ///
    /// Times must start at zero and strictly increase. Heights are clamped
    /// to be non-negative and made non-increasing: a draining tank never
    /// refills, so upward wiggles from interpolation are flattened.
    pub fn from_samples(t: Vec<f64>, h: Vec<f64>) -> SimResult<Self> {
        if t.is_empty() || t.len() != h.len() {
            return Err(SimError::InvalidArg {
                what: "trajectory needs matching, non-empty time and height series",
            });
        }
        if t[0] != 0.0 {
            return Err(SimError::InvalidArg {
                what: "trajectory must start at t=0",
            });
        }
        if t.iter().any(|v| !v.is_finite()) || t.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidArg {
                what: "trajectory times must be finite and strictly increasing",
            });
        }
        if h.iter().any(|v| v.is_nan()) {
            return Err(SimError::NonPhysical {
                what: "trajectory height is NaN",
            });
        }

        let mut floor = f64::INFINITY;
        let h = h
            .into_iter()
            .map(|v| {
                floor = floor.min(clamp_height(v));
                floor
            })
            .collect();

        Ok(Self {
            t,
            h,
            snap: SnapPolicy::default(),
        })
    }

    pub fn from_record(record: SimRecord<f64>) -> SimResult<Self> {
        Self::from_samples(record.t, record.x)
    }

    /// Replace the end-of-span snap rule.
    pub fn with_snap_policy(mut self, snap: SnapPolicy) -> Self {
        self.snap = snap;
        self
    }

    pub fn snap_policy(&self) -> SnapPolicy {
        self.snap
    }

    /// Total simulated span (s).
    pub fn span_s(&self) -> f64 {
        self.t[self.t.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn heights(&self) -> &[f64] {
        &self.h
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.t.iter().copied().zip(self.h.iter().copied())
    }

    pub fn initial_height_m(&self) -> f64 {
        self.h[0]
    }

    /// Last computed height, before any presentation clamping.
    pub fn final_height_m(&self) -> f64 {
        self.h[self.h.len() - 1]
    }

    /// Linear interpolation between bracketing samples, no snapping.
    ///
    /// Times before zero read the initial height, times past the span the
    /// final computed height.
    pub fn raw_height_at(&self, elapsed: f64) -> f64 {
        let n = self.t.len();
        if !(elapsed > self.t[0]) {
            return self.h[0];
        }
        if elapsed >= self.t[n - 1] {
            return self.h[n - 1];
        }
        // First index with t > elapsed; 1 <= i <= n-1 here
        let i = self.t.partition_point(|&ti| ti <= elapsed);
        lerp(self.t[i - 1], self.h[i - 1], self.t[i], self.h[i], elapsed)
    }

    /// Height to display at `elapsed` seconds.
    ///
    /// Exactly zero once `elapsed >= span`, and zero inside the span when
    /// the [`SnapPolicy`] applies. NaN reads as past the end.
    pub fn height_at(&self, elapsed: f64) -> f64 {
        let span = self.span_s();
        if !(elapsed < span) {
            return 0.0;
        }
        let h = self.raw_height_at(elapsed);
        if self.snap.applies(elapsed, span, h) {
            0.0
        } else {
            h
        }
    }

    /// First time the level drops below `threshold_m`, interpolated
    /// linearly between samples. `None` if it never does within the span.
    pub fn first_time_below(&self, threshold_m: f64) -> Option<f64> {
        let i = self.h.iter().position(|&h| h < threshold_m)?;
        if i == 0 {
            return Some(self.t[0]);
        }
        let (t0, h0) = (self.t[i - 1], self.h[i - 1]);
        let (t1, h1) = (self.t[i], self.h[i]);
        let dh = h0 - h1;
        if dh <= 0.0 {
            return Some(t1);
        }
        Some(t0 + (h0 - threshold_m) / dh * (t1 - t0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Trajectory {
        // 4 m draining linearly to 0 over 4 s
        Trajectory::from_samples(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0, 0.0])
            .unwrap()
    }

    #[test]
    fn interpolates_between_samples() {
        let traj = ramp();
        assert_eq!(traj.height_at(0.0), 4.0);
        assert_eq!(traj.height_at(1.5), 2.5);
        assert_eq!(traj.height_at(-1.0), 4.0);
    }

    #[test]
    fn clamps_to_zero_at_and_after_span() {
        let traj = Trajectory::from_samples(vec![0.0, 10.0], vec![5.0, 0.4]).unwrap();
        assert_eq!(traj.height_at(10.0), 0.0);
        assert_eq!(traj.height_at(1e6), 0.0);
        assert_eq!(traj.height_at(f64::NAN), 0.0);
        // Residual is still visible without presentation clamping
        assert_eq!(traj.raw_height_at(10.0), 0.4);
    }

    #[test]
    fn snaps_near_end_only_below_threshold() {
        let traj = Trajectory::from_samples(vec![0.0, 9.0, 10.0], vec![5.0, 0.04, 0.03]).unwrap();
        // 96% of span, below 0.05 m
        assert_eq!(traj.height_at(9.6), 0.0);
        // Below threshold but too early
        let early =
            Trajectory::from_samples(vec![0.0, 5.0, 10.0], vec![5.0, 0.04, 0.03]).unwrap();
        assert!(early.height_at(6.0) > 0.0);
    }

    #[test]
    fn snap_thresholds_are_independent() {
        let traj = Trajectory::from_samples(vec![0.0, 9.0, 10.0], vec![5.0, 0.2, 0.2])
            .unwrap()
            .with_snap_policy(SnapPolicy {
                below_m: 0.5,
                after_fraction: 0.8,
            });
        assert_eq!(traj.height_at(9.5), 0.0);
        let plain = traj.clone().with_snap_policy(SnapPolicy::disabled());
        assert_eq!(plain.height_at(9.5), 0.2);
    }

    #[test]
    fn heights_made_monotone_and_non_negative() {
        let traj =
            Trajectory::from_samples(vec![0.0, 1.0, 2.0, 3.0], vec![2.0, 1.0, 1.0001, -1e-9])
                .unwrap();
        assert_eq!(traj.heights(), &[2.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn rejects_bad_time_axes() {
        assert!(Trajectory::from_samples(vec![], vec![]).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Trajectory::from_samples(vec![0.5, 1.0], vec![1.0, 0.5]).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 1.0, 1.0], vec![1.0, 0.5, 0.4]).is_err());
        assert!(Trajectory::from_samples(vec![0.0, 1.0], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn first_time_below_interpolates() {
        let traj = ramp();
        let t = traj.first_time_below(0.5).unwrap();
        assert!((t - 3.5).abs() < 1e-12);
        assert_eq!(traj.first_time_below(10.0), Some(0.0));
        let full = Trajectory::from_samples(vec![0.0, 1.0], vec![5.0, 4.0]).unwrap();
        assert_eq!(full.first_time_below(1.0), None);
    }

    #[test]
    fn accessors() {
        let traj = ramp();
        assert_eq!(traj.len(), 5);
        assert!(!traj.is_empty());
        assert_eq!(traj.span_s(), 4.0);
        assert_eq!(traj.initial_height_m(), 4.0);
        assert_eq!(traj.final_height_m(), 0.0);
        assert_eq!(traj.samples().count(), 5);
        assert_eq!(traj.snap_policy(), SnapPolicy::default());
    }
}
