//! Wall-clock stopwatch accumulating over start/pause intervals.

use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or resume) timing. Has no effect if already running.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop timing and add the current interval to the total.
    pub fn pause(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Accumulated time in seconds, including a running interval.
    pub fn seconds(&self) -> f64 {
        let running = self.started.map_or(Duration::ZERO, |s| s.elapsed());
        (self.elapsed + running).as_secs_f64()
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
    }
}
