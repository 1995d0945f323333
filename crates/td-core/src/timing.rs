//! Lightweight wall-clock timing utilities.
//!
//! Used for run summaries and for the calibration wall-clock budget.
//! Printing can be enabled via the `TD_TIMING` environment variable or
//! programmatically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable timing output globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Check if timing output is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("TD_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Seconds elapsed since start.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and return elapsed time in seconds.
    pub fn stop(self) -> f64 {
        self.elapsed_s()
    }

    /// Stop the timer and print the result if enabled.
    pub fn stop_and_print(self) -> f64 {
        let label = self.label;
        let elapsed = self.stop();
        if is_enabled() {
            println!("[TIMING] {}: {:.3}s", label, elapsed);
        }
        elapsed
    }
}

/// Optional wall-clock deadline.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// True once the budget (if any) is exhausted.
    pub fn expired(&self) -> bool {
        match self.budget {
            Some(b) => self.start.elapsed() >= b,
            None => false,
        }
    }
}
