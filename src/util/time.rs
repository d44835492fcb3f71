//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
        * 1000.0
}

/// Target frame rate of the peer loop
pub const FRAME_TPS: u32 = 60;
pub const FRAME_DURATION_MICROS: u64 = 1_000_000 / FRAME_TPS as u64;

/// Nominal frame delta in seconds, also the catch-up sub-step ceiling
pub fn frame_delta() -> f64 {
    1.0 / FRAME_TPS as f64
}

/// Window after which a silent remote aircraft is force-removed, in milliseconds
pub const REMOTE_TIMEOUT_MILLIS: f64 = 1000.0;

/// Updates older than this are rejected as stale, in seconds
pub const STALE_THRESHOLD_SECS: f64 = 0.25;

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
