// Path: crates/telemetry/src/time.rs
//! An RAII timer that reports its lifetime to a histogram-style callback.

use std::time::Instant;

/// Calls `observe` with the elapsed seconds when dropped.
pub struct Timer<F: FnOnce(f64)> {
    start: Instant,
    observe: Option<F>,
}

impl<F: FnOnce(f64)> Timer<F> {
    pub fn new(observe: F) -> Self {
        Self {
            start: Instant::now(),
            observe: Some(observe),
        }
    }
}

impl<F: FnOnce(f64)> Drop for Timer<F> {
    fn drop(&mut self) {
        if let Some(observe) = self.observe.take() {
            observe(self.start.elapsed().as_secs_f64());
        }
    }
}
