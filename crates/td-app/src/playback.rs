//! Real-time playback of a finished run.
//!
//! A [`Playback`] owns a shared handle to an immutable [`Trajectory`] and
//! samples it against a [`Clock`] at a fixed tick. The simulation is never
//! re-run while playing.

use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use td_sim::Trajectory;
use td_tank::TankGeometry;

use crate::error::{AppError, AppResult};
use crate::run_service::RunResponse;

/// Default render rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Source of elapsed simulated time.
pub trait Clock {
    /// Simulated seconds since playback started.
    fn elapsed_s(&self) -> f64;
}

/// Wall clock scaled by a speed factor.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
    speed: f64,
}

impl MonotonicClock {
    pub fn new(speed: f64) -> AppResult<Self> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "Playback speed must be positive, got {}",
                speed
            )));
        }
        Ok(Self {
            start: Instant::now(),
            speed,
        })
    }
}

impl Clock for MonotonicClock {
    fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * self.speed
    }
}

/// Manually advanced clock, for tests and stepping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_s: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, dt_s: f64) {
        self.now_s.set(self.now_s.get() + dt_s);
    }

    pub fn set(&self, t_s: f64) {
        self.now_s.set(t_s);
    }
}

impl Clock for ManualClock {
    fn elapsed_s(&self) -> f64 {
        self.now_s.get()
    }
}

/// One rendered sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackFrame {
    pub elapsed_s: f64,
    pub height_m: f64,
    pub volume_m3: f64,
    pub fill_percent: f64,
    pub finished: bool,
}

pub struct Playback<C: Clock> {
    trajectory: Arc<Trajectory>,
    geometry: TankGeometry,
    reference_height_m: f64,
    clock: C,
    tick: Duration,
}

impl<C: Clock> Playback<C> {
    pub fn new(
        trajectory: Arc<Trajectory>,
        geometry: TankGeometry,
        reference_height_m: f64,
        clock: C,
    ) -> Self {
        Self {
            trajectory,
            geometry,
            reference_height_m,
            clock,
            tick: Duration::from_secs_f64(1.0 / DEFAULT_FPS),
        }
    }

    /// Play back a completed run.
    pub fn for_run(response: &RunResponse, clock: C) -> Self {
        Self::new(
            Arc::clone(&response.trajectory),
            response.geometry,
            response.initial_height_m,
            clock,
        )
    }

    pub fn with_fps(mut self, fps: f64) -> AppResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "Frame rate must be positive, got {}",
                fps
            )));
        }
        self.tick = Duration::try_from_secs_f64(1.0 / fps)
            .map_err(|e| AppError::InvalidInput(format!("Frame rate {} unusable: {}", fps, e)))?;
        Ok(self)
    }

    /// Wall-clock interval between frames.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn span_s(&self) -> f64 {
        self.trajectory.span_s()
    }

    /// Frame at an explicit elapsed time.
    pub fn frame_at(&self, elapsed_s: f64) -> PlaybackFrame {
        let height_m = self.trajectory.height_at(elapsed_s);
        PlaybackFrame {
            elapsed_s,
            height_m,
            volume_m3: self.geometry.cap_volume(height_m),
            fill_percent: self.geometry.fill_percent(height_m, self.reference_height_m),
            finished: !(elapsed_s < self.trajectory.span_s()),
        }
    }

    /// Frame at the clock's current time.
    pub fn frame(&self) -> PlaybackFrame {
        self.frame_at(self.clock.elapsed_s())
    }
}
